use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const MEETING_COLLECTION_NAME: &str = "meetings";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum AttendeeResponse {
    #[default]
    Invited,
    Accepted,
    Declined,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
    /// Set when the attendee is a CRM contact
    pub contact_id: Option<String>,
    pub response: AttendeeResponse,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Meeting {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub organizer: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime>,
    pub end_time: Option<DateTime>,
    pub status: MeetingStatus,
    pub attendees: Vec<Attendee>,
}

impl IntoIndexes for Meeting {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(
            "meeting_start_index",
            doc! { "company_id": 1, "startTime": 1 },
        )]
    }
}

impl Entity for Meeting {
    const COLLECTION: &'static str = MEETING_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["startTime", "endTime"];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
