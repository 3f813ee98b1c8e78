use bson::{doc, DateTime};
use crm_db::{
    query::{Filter, Sort},
    repository::{Repository, TenantRepository},
    schemas::{
        invoice::INVOICE_STATUS_FIELD, Invoice, InvoiceStatus, Payment, Record,
    },
    store::{DocumentStore, Patch},
    DbError, DbResult,
};

use crate::common::{list_between, list_by, list_where, require, set_status, CrmService};

// Payments within half a cent of the amount settle the invoice.
const SETTLED_EPSILON: f64 = 0.005;

#[derive(Debug, Clone)]
pub struct InvoiceService<S> {
    repo: TenantRepository<Invoice, S>,
}

impl<S: DocumentStore> CrmService<Invoice, S> for InvoiceService<S> {
    fn repo(&self) -> &TenantRepository<Invoice, S> {
        &self.repo
    }
}

impl<S: DocumentStore> InvoiceService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, invoice: Invoice) -> DbResult<Record<Invoice>> {
        require("invoiceNumber", &invoice.invoice_number)?;
        if invoice.amount <= 0.0 {
            return Err(DbError::validation("invoice amount must be positive"));
        }
        self.repo.create(invoice).await
    }

    pub async fn by_status(&self, status: InvoiceStatus) -> DbResult<Vec<Record<Invoice>>> {
        list_by(&self.repo, INVOICE_STATUS_FIELD, status.to_string()).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Invoice>> {
        set_status::<InvoiceStatus, _, _>(&self.repo, id, INVOICE_STATUS_FIELD, "invoice", status)
            .await
    }

    pub async fn due_between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> DbResult<Vec<Record<Invoice>>> {
        list_between(&self.repo, "dueDate", start, end).await
    }

    /// Pending invoices whose due date is before `now`, oldest first.
    pub async fn overdue(&self, now: DateTime) -> DbResult<Vec<Record<Invoice>>> {
        let filter = Filter::and(vec![
            Filter::eq(INVOICE_STATUS_FIELD, InvoiceStatus::Pending.to_string())?,
            Filter::lt("dueDate", now)?,
        ])?;
        list_where(&self.repo, filter, Some(Sort::asc("dueDate"))).await
    }

    /// Appends a payment atomically and marks the invoice `Paid` once the
    /// payments cover its amount.
    pub async fn record_payment(&self, id: &str, mut payment: Payment) -> DbResult<Record<Invoice>> {
        if payment.amount <= 0.0 {
            return Err(DbError::validation("payment amount must be positive"));
        }
        let current = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(self.repo.repository().collection(), id))?;
        if current.data.status == InvoiceStatus::Cancelled {
            return Err(DbError::validation(format!(
                "invoice {} is cancelled and cannot take payments",
                id
            )));
        }

        payment.paid_at.get_or_insert_with(DateTime::now);
        let payment = bson::to_bson(&payment)?;
        let updated = self
            .repo
            .apply(id, Patch::new().push("paymentHistory", payment))
            .await?;

        if updated.data.status != InvoiceStatus::Paid
            && updated.data.balance() <= SETTLED_EPSILON
        {
            log::info!("Invoice {} is fully paid", id);
            return self
                .repo
                .update(id, doc! { INVOICE_STATUS_FIELD: InvoiceStatus::Paid.to_string() })
                .await;
        }
        Ok(updated)
    }
}
