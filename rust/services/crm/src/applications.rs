use bson::DateTime;
use crm_db::{
    repository::{Repository, TenantRepository},
    schemas::{Application, ApplicationStatus, Record},
    store::DocumentStore,
    DbError, DbResult,
};

use crate::common::{list_by, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct ApplicationService<S> {
    repo: TenantRepository<Application, S>,
}

impl<S: DocumentStore> CrmService<Application, S> for ApplicationService<S> {
    fn repo(&self) -> &TenantRepository<Application, S> {
        &self.repo
    }
}

impl<S: DocumentStore> ApplicationService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    /// Files a new application. `appliedAt` defaults to now.
    pub async fn create(&self, mut application: Application) -> DbResult<Record<Application>> {
        require("applicantName", &application.applicant_name)?;
        require("email", &application.email)?;
        require("position", &application.position)?;
        if !application.email.contains('@') {
            return Err(DbError::validation(format!(
                "invalid email address '{}'",
                application.email
            )));
        }
        application.applied_at.get_or_insert_with(DateTime::now);
        self.repo.create(application).await
    }

    pub async fn by_status(
        &self,
        status: ApplicationStatus,
    ) -> DbResult<Vec<Record<Application>>> {
        list_by(&self.repo, "status", status.to_string()).await
    }

    pub async fn by_position(&self, position: &str) -> DbResult<Vec<Record<Application>>> {
        list_by(&self.repo, "position", position).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Application>> {
        set_status::<ApplicationStatus, _, _>(&self.repo, id, "status", "application", status)
            .await
    }
}
