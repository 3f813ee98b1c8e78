/*
Service Name: CRM
Collections: contacts, leads, deals, properties, invoices, meetings, todos,
             attendance, applications, history
Scope: every service is bound to one company (tenant)
*/

#[cfg(test)]
mod tests;

pub mod applications;
pub mod attendance;
pub mod common;
pub mod config;
pub mod contacts;
pub mod deals;
pub mod history;
pub mod import;
pub mod invoices;
pub mod leads;
pub mod meetings;
pub mod properties;
pub mod todos;

use crm_db::{store::DocumentStore, DbResult};

pub use applications::ApplicationService;
pub use attendance::AttendanceService;
pub use common::CrmService;
pub use contacts::ContactService;
pub use deals::DealService;
pub use history::HistoryService;
pub use import::{import_records, ImportFailure, ImportReport};
pub use invoices::InvoiceService;
pub use leads::LeadService;
pub use meetings::MeetingService;
pub use properties::PropertyService;
pub use todos::TodoService;

/// Every entity service for one company, sharing one store handle.
#[derive(Debug, Clone)]
pub struct CrmServices<S> {
    pub contacts: ContactService<S>,
    pub leads: LeadService<S>,
    pub deals: DealService<S>,
    pub properties: PropertyService<S>,
    pub invoices: InvoiceService<S>,
    pub meetings: MeetingService<S>,
    pub todos: TodoService<S>,
    pub attendance: AttendanceService<S>,
    pub applications: ApplicationService<S>,
    pub history: HistoryService<S>,
}

impl<S: DocumentStore> CrmServices<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        let company_id = company_id.into();
        Self {
            contacts: ContactService::new(store.clone(), company_id.clone()),
            leads: LeadService::new(store.clone(), company_id.clone()),
            deals: DealService::new(store.clone(), company_id.clone()),
            properties: PropertyService::new(store.clone(), company_id.clone()),
            invoices: InvoiceService::new(store.clone(), company_id.clone()),
            meetings: MeetingService::new(store.clone(), company_id.clone()),
            todos: TodoService::new(store.clone(), company_id.clone()),
            attendance: AttendanceService::new(store.clone(), company_id.clone()),
            applications: ApplicationService::new(store.clone(), company_id.clone()),
            history: HistoryService::new(store, company_id),
        }
    }

    pub fn company_id(&self) -> &str {
        self.contacts.repo().company_id()
    }

    /// Creates the tenant and entity indexes of every collection.
    pub async fn ensure_all_indexes(&self) -> DbResult<()> {
        self.contacts.repo().repository().ensure_indexes().await?;
        self.leads.repo().repository().ensure_indexes().await?;
        self.deals.repo().repository().ensure_indexes().await?;
        self.properties.repo().repository().ensure_indexes().await?;
        self.invoices.repo().repository().ensure_indexes().await?;
        self.meetings.repo().repository().ensure_indexes().await?;
        self.todos.repo().repository().ensure_indexes().await?;
        self.attendance.repo().repository().ensure_indexes().await?;
        self.applications.repo().repository().ensure_indexes().await?;
        self.history.repo().repository().ensure_indexes().await?;
        log::info!("Ensured indexes for company {}", self.company_id());
        Ok(())
    }
}
