use bson::{Bson, DateTime, Document};
use serde::{Deserialize, Serialize};

pub const IS_DELETED_FIELD: &str = "isDeleted";
pub const DELETED_AT_FIELD: &str = "deletedAt";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const COMPANY_ID_FIELD: &str = "company_id";

/// Lifecycle fields owned by the repository. Callers never set these directly.
pub const METADATA_FIELDS: [&str; 4] = [
    IS_DELETED_FIELD,
    DELETED_AT_FIELD,
    CREATED_AT_FIELD,
    UPDATED_AT_FIELD,
];

/// Common metadata fields for stored documents
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Flag indicating if the document has been marked as deleted
    pub is_deleted: bool,
    /// Timestamp when the document was deleted
    pub deleted_at: Option<DateTime>,
    /// Timestamp of the last update
    pub updated_at: Option<DateTime>,
    /// Timestamp when the document was created
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Removes the metadata fields from `document` and returns them.
    /// Absent or mistyped fields fall back to their defaults.
    pub fn take_from(document: &mut Document) -> Self {
        let mut take_date = |field: &str| match document.remove(field) {
            Some(Bson::DateTime(dt)) => Some(dt),
            _ => None,
        };
        let deleted_at = take_date(DELETED_AT_FIELD);
        let updated_at = take_date(UPDATED_AT_FIELD);
        let created_at = take_date(CREATED_AT_FIELD);
        let is_deleted = matches!(document.remove(IS_DELETED_FIELD), Some(Bson::Boolean(true)));
        Self {
            is_deleted,
            deleted_at,
            updated_at,
            created_at,
        }
    }

    pub fn write_into(&self, document: &mut Document) {
        let date = |dt: Option<DateTime>| dt.map_or(Bson::Null, Bson::DateTime);
        document.insert(IS_DELETED_FIELD, self.is_deleted);
        document.insert(DELETED_AT_FIELD, date(self.deleted_at));
        document.insert(CREATED_AT_FIELD, date(self.created_at));
        document.insert(UPDATED_AT_FIELD, date(self.updated_at));
    }
}
