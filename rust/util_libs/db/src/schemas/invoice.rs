use bson::{doc, DateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity::{Entity, IntoIndexes};
use crate::store::IndexSpec;

pub const INVOICE_COLLECTION_NAME: &str = "invoices";
/// Invoices keep the capitalised field name they were first written with.
pub const INVOICE_STATUS_FIELD: &str = "Status";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, EnumString, Display)]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Missed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Payment {
    pub amount: f64,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub paid_at: Option<DateTime>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "company_id")]
    pub company_id: String,
    pub invoice_number: String,
    /// Contact being billed
    pub client_id: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "Status")]
    pub status: InvoiceStatus,
    pub amount: f64,
    pub issued_date: Option<DateTime>,
    pub due_date: Option<DateTime>,
    pub payment_history: Vec<Payment>,
}

impl Invoice {
    pub fn amount_paid(&self) -> f64 {
        self.payment_history.iter().map(|p| p.amount).sum()
    }

    pub fn balance(&self) -> f64 {
        self.amount - self.amount_paid()
    }
}

impl IntoIndexes for Invoice {
    fn into_indices(self) -> Vec<IndexSpec> {
        vec![
            IndexSpec::new(
                "invoice_status_index",
                doc! { "company_id": 1, "Status": 1 },
            ),
            IndexSpec::new(
                "invoice_number_index",
                doc! { "company_id": 1, "invoiceNumber": 1 },
            ),
        ]
    }
}

impl Entity for Invoice {
    const COLLECTION: &'static str = INVOICE_COLLECTION_NAME;
    const DATE_FIELDS: &'static [&'static str] = &["issuedDate", "dueDate"];
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] =
        &[("InvoiceNumber", "invoiceNumber"), ("DueDate", "dueDate")];

    fn company_id(&self) -> &str {
        &self.company_id
    }
}
