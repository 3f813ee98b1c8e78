use bson::{doc, Document};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const HISTORY_COLLECTION_NAME: &str = "history";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum HistoryAction {
    #[default]
    Created,
    Updated,
    StatusChanged,
    Deleted,
    Restored,
}

/// Audit trail entry describing a change to another entity
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct History {
    #[serde(rename = "company_id")]
    pub company_id: String,
    /// Collection of the changed entity
    pub entity_type: String,
    pub entity_id: String,
    pub action: HistoryAction,
    pub performed_by: Option<String>,
    pub description: Option<String>,
    /// Changed fields with their new values
    pub changes: Option<Document>,
}

impl IntoIndexes for History {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "history_entity_index",
            doc! { "company_id": 1, "entityId": 1, "createdAt": -1 },
        )]
    }
}

impl Entity for History {
    const COLLECTION: &'static str = HISTORY_COLLECTION_NAME;

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
