use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const APPLICATION_COLLECTION_NAME: &str = "applications";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum ApplicationStatus {
    #[default]
    Received,
    Reviewing,
    Interview,
    Offered,
    Rejected,
    Hired,
}

/// Job application submitted to the agency
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: String,
    pub status: ApplicationStatus,
    pub resume_url: Option<String>,
    pub cover_letter: Option<String>,
    pub applied_at: Option<DateTime>,
}

impl IntoIndexes for Application {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "application_position_index",
            doc! { "company_id": 1, "position": 1, "status": 1 },
        )]
    }
}

impl Entity for Application {
    const COLLECTION: &'static str = APPLICATION_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["appliedAt"];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
