//! Test support shared by the workspace: an ephemeral `mongod` runner and
//! entity fixtures.

pub mod fixtures;
pub mod mongodb_runner;
