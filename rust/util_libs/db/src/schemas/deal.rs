use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use super::shared::Note;
use crate::store::IndexSpec;

pub const DEAL_COLLECTION_NAME: &str = "deals";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum DealStage {
    #[default]
    Prospecting,
    Negotiation,
    UnderContract,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub fn is_closed(self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Deal {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub title: String,
    pub contact_id: Option<String>,
    pub property_id: Option<String>,
    pub value: f64,
    pub stage: DealStage,
    pub assigned_to: Option<String>,
    pub expected_close_date: Option<DateTime>,
    pub notes: Vec<Note>,
}

impl IntoIndexes for Deal {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "deal_stage_index",
            doc! { "company_id": 1, "stage": 1 },
        )]
    }
}

impl Entity for Deal {
    const COLLECTION: &'static str = DEAL_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["expectedCloseDate"];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
