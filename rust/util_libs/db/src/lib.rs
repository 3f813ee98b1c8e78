//! Document repository layer for the CRM.
//!
//! Entities are stored as flat documents in named collections. [`repository::Repository`]
//! gives every entity the same create/read/update/delete, soft-delete, listing,
//! pagination, subscription and batch-write operations on top of any
//! [`store::DocumentStore`]. [`repository::TenantRepository`] binds a repository to
//! one company so a tenant-scoped query cannot be written without the tenant id.

pub mod error;
pub mod mongodb;
pub mod query;
pub mod repository;
pub mod schemas;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{DbError, DbResult};
