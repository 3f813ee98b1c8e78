use bson::Document;
use crm_db::{
    query::{Filter, Sort},
    repository::{Repository, TenantRepository},
    schemas::{History, HistoryAction, Record},
    store::DocumentStore,
    DbResult,
};

use crate::common::{list_where, require, CrmService};

/// Audit trail of changes made to the tenant's entities.
#[derive(Debug, Clone)]
pub struct HistoryService<S> {
    repo: TenantRepository<History, S>,
}

impl<S: DocumentStore> CrmService<History, S> for HistoryService<S> {
    fn repo(&self) -> &TenantRepository<History, S> {
        &self.repo
    }
}

impl<S: DocumentStore> HistoryService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn record(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: HistoryAction,
        performed_by: Option<&str>,
        changes: Option<Document>,
    ) -> DbResult<Record<History>> {
        require("entityType", entity_type)?;
        require("entityId", entity_id)?;
        self.repo
            .create(History {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                action,
                performed_by: performed_by.map(str::to_string),
                changes,
                ..Default::default()
            })
            .await
    }

    /// History of one entity, newest first.
    pub async fn for_entity(&self, entity_id: &str) -> DbResult<Vec<Record<History>>> {
        list_where(
            &self.repo,
            Filter::eq("entityId", entity_id)?,
            Some(Sort::desc("createdAt")),
        )
        .await
    }

    pub async fn for_type(&self, entity_type: &str) -> DbResult<Vec<Record<History>>> {
        list_where(
            &self.repo,
            Filter::eq("entityType", entity_type)?,
            Some(Sort::desc("createdAt")),
        )
        .await
    }
}
