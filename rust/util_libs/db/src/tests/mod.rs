use crate::repository::Repository;
use crate::schemas::{Contact, ContactStatus, Invoice, InvoiceStatus};
use crate::store::MemoryStore;

mod pagination;
mod subscription;

#[cfg(feature = "tests_integration_mongodb")]
mod mongodb;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn contact(company_id: &str, first_name: &str) -> Contact {
    Contact {
        company_id: company_id.to_string(),
        first_name: first_name.to_string(),
        last_name: "Doe".to_string(),
        status: ContactStatus::Active,
        ..Default::default()
    }
}

pub(crate) fn invoice(company_id: &str, number: &str, status: InvoiceStatus) -> Invoice {
    Invoice {
        company_id: company_id.to_string(),
        invoice_number: number.to_string(),
        status,
        amount: 100.0,
        ..Default::default()
    }
}

pub(crate) fn contacts(store: &MemoryStore) -> Repository<Contact, MemoryStore> {
    Repository::new(store.clone())
}

pub(crate) fn invoices(store: &MemoryStore) -> Repository<Invoice, MemoryStore> {
    Repository::new(store.clone())
}
