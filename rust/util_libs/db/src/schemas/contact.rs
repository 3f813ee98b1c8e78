use bson::doc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use super::shared::{Address, Note};
use crate::store::IndexSpec;

/// Collection name for contact documents
pub const CONTACT_COLLECTION_NAME: &str = "contacts";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum ContactStatus {
    #[default]
    Active,
    Inactive,
    Lead,
    Client,
}

/// Person or organisation the agency deals with
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Contact {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: ContactStatus,
    /// User id of the agent responsible for the contact
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub address: Option<Address>,
    pub notes: Vec<Note>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl IntoIndexes for Contact {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![
            IndexSpec::new("contact_status_index", doc! { "company_id": 1, "status": 1 }),
            IndexSpec::new(
                "contact_assignee_index",
                doc! { "company_id": 1, "assignedTo": 1 },
            ),
        ]
    }
}

impl Entity for Contact {
    const COLLECTION: &'static str = CONTACT_COLLECTION_NAME;

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
