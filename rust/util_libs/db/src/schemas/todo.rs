use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const TODO_COLLECTION_NAME: &str = "todos";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum TodoPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Todo {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime>,
    pub completed_at: Option<DateTime>,
}

impl IntoIndexes for Todo {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "todo_assignee_index",
            doc! { "company_id": 1, "assignedTo": 1, "status": 1 },
        )]
    }
}

impl Entity for Todo {
    const COLLECTION: &'static str = TODO_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["dueDate", "completedAt"];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
