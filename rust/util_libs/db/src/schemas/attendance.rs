use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const ATTENDANCE_COLLECTION_NAME: &str = "attendance";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum AttendanceStatus {
    #[default]
    Present,
    Late,
    Absent,
    OnLeave,
}

/// One employee's attendance for one working day
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Attendance {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub employee_id: String,
    /// Working day, at midnight UTC
    pub date: Option<DateTime>,
    pub check_in: Option<DateTime>,
    pub check_out: Option<DateTime>,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

impl Attendance {
    /// Hours between check-in and check-out, when both are recorded.
    pub fn worked_hours(&self) -> Option<f64> {
        let start = self.check_in?.timestamp_millis();
        let end = self.check_out?.timestamp_millis();
        (end >= start).then(|| (end - start) as f64 / 3_600_000.0)
    }
}

impl IntoIndexes for Attendance {
    fn into_indices(self) -> Vec<IndexSpec> {
        // One attendance per employee and day.
        vec![IndexSpec::new(
            "attendance_employee_day_index",
            doc! { "company_id": 1, "employeeId": 1, "date": 1 },
        )
        .unique()]
    }
}

impl Entity for Attendance {
    const COLLECTION: &'static str = ATTENDANCE_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["date", "checkIn", "checkOut"];
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] =
        &[("CheckIn", "checkIn"), ("CheckOut", "checkOut")];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
