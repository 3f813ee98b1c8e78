use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Free-text note appended to contacts, leads and deals
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Note {
    pub text: String,
    /// User id of the author
    pub author: Option<String>,
    pub created_at: Option<DateTime>,
}

impl Note {
    pub fn new(text: impl Into<String>, author: Option<String>) -> Self {
        Self {
            text: text.into(),
            author,
            created_at: Some(DateTime::now()),
        }
    }
}

/// Logged interaction with a lead (call, email, visit...)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Activity {
    pub kind: String,
    pub description: String,
    pub performed_by: Option<String>,
    pub occurred_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}
