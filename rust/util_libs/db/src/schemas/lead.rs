use bson::doc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use super::shared::{Activity, Note};
use crate::store::IndexSpec;

pub const LEAD_COLLECTION_NAME: &str = "leads";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Lost,
    Converted,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Lead {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Where the lead came from (website, referral, portal...)
    pub source: Option<String>,
    pub status: LeadStatus,
    pub assigned_to: Option<String>,
    pub budget: Option<f64>,
    pub interested_in: Vec<String>,
    pub activities: Vec<Activity>,
    pub notes: Vec<Note>,
}

impl IntoIndexes for Lead {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "lead_status_index",
            doc! { "company_id": 1, "status": 1 },
        )]
    }
}

impl Entity for Lead {
    const COLLECTION: &'static str = LEAD_COLLECTION_NAME;

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
