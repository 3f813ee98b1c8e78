use bson::DateTime;
use crm_db::{
    repository::{Repository, TenantRepository},
    schemas::{Activity, Lead, LeadStatus, Note, Record},
    store::{DocumentStore, Patch},
    DbResult,
};

use crate::common::{list_by, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct LeadService<S> {
    repo: TenantRepository<Lead, S>,
}

impl<S: DocumentStore> CrmService<Lead, S> for LeadService<S> {
    fn repo(&self) -> &TenantRepository<Lead, S> {
        &self.repo
    }
}

impl<S: DocumentStore> LeadService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, lead: Lead) -> DbResult<Record<Lead>> {
        require("name", &lead.name)?;
        self.repo.create(lead).await
    }

    pub async fn by_status(&self, status: LeadStatus) -> DbResult<Vec<Record<Lead>>> {
        list_by(&self.repo, "status", status.to_string()).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Lead>> {
        set_status::<LeadStatus, _, _>(&self.repo, id, "status", "lead", status).await
    }

    pub async fn by_source(&self, source: &str) -> DbResult<Vec<Record<Lead>>> {
        list_by(&self.repo, "source", source).await
    }

    pub async fn assigned_to(&self, user_id: &str) -> DbResult<Vec<Record<Lead>>> {
        list_by(&self.repo, "assignedTo", user_id).await
    }

    /// Appends an activity atomically, stamping it now if it has no time.
    pub async fn add_activity(&self, id: &str, mut activity: Activity) -> DbResult<Record<Lead>> {
        require("kind", &activity.kind)?;
        activity.occurred_at.get_or_insert_with(DateTime::now);
        let activity = bson::to_bson(&activity)?;
        self.repo
            .apply(id, Patch::new().push("activities", activity))
            .await
    }

    pub async fn add_note(&self, id: &str, note: Note) -> DbResult<Record<Lead>> {
        require("text", &note.text)?;
        let note = bson::to_bson(&note)?;
        self.repo.apply(id, Patch::new().push("notes", note)).await
    }
}
