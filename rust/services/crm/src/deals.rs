use bson::DateTime;
use crm_db::{
    repository::{Repository, TenantRepository},
    schemas::{Deal, DealStage, Note, Record},
    store::{DocumentStore, Patch},
    DbResult,
};

use crate::common::{list_between, list_by, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct DealService<S> {
    repo: TenantRepository<Deal, S>,
}

impl<S: DocumentStore> CrmService<Deal, S> for DealService<S> {
    fn repo(&self) -> &TenantRepository<Deal, S> {
        &self.repo
    }
}

impl<S: DocumentStore> DealService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, deal: Deal) -> DbResult<Record<Deal>> {
        require("title", &deal.title)?;
        self.repo.create(deal).await
    }

    pub async fn by_stage(&self, stage: DealStage) -> DbResult<Vec<Record<Deal>>> {
        list_by(&self.repo, "stage", stage.to_string()).await
    }

    pub async fn update_stage(&self, id: &str, stage: &str) -> DbResult<Record<Deal>> {
        set_status::<DealStage, _, _>(&self.repo, id, "stage", "deal", stage).await
    }

    /// Deals expected to close within `[start, end]`.
    pub async fn closing_between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> DbResult<Vec<Record<Deal>>> {
        list_between(&self.repo, "expectedCloseDate", start, end).await
    }

    pub async fn assigned_to(&self, user_id: &str) -> DbResult<Vec<Record<Deal>>> {
        list_by(&self.repo, "assignedTo", user_id).await
    }

    pub async fn add_note(&self, id: &str, note: Note) -> DbResult<Record<Deal>> {
        require("text", &note.text)?;
        let note = bson::to_bson(&note)?;
        self.repo.apply(id, Patch::new().push("notes", note)).await
    }
}
