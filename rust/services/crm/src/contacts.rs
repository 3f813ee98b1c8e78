use crm_db::{
    query::Filter,
    repository::{Repository, TenantRepository},
    schemas::{Contact, ContactStatus, Note, Record},
    store::{DocumentStore, Patch},
    DbResult,
};

use crate::common::{list_by, list_where, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct ContactService<S> {
    repo: TenantRepository<Contact, S>,
}

impl<S: DocumentStore> CrmService<Contact, S> for ContactService<S> {
    fn repo(&self) -> &TenantRepository<Contact, S> {
        &self.repo
    }
}

impl<S: DocumentStore> ContactService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, contact: Contact) -> DbResult<Record<Contact>> {
        require("firstName", &contact.first_name)?;
        self.repo.create(contact).await
    }

    pub async fn by_status(&self, status: ContactStatus) -> DbResult<Vec<Record<Contact>>> {
        list_by(&self.repo, "status", status.to_string()).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Contact>> {
        set_status::<ContactStatus, _, _>(&self.repo, id, "status", "contact", status).await
    }

    pub async fn assigned_to(&self, user_id: &str) -> DbResult<Vec<Record<Contact>>> {
        list_by(&self.repo, "assignedTo", user_id).await
    }

    pub async fn with_tag(&self, tag: &str) -> DbResult<Vec<Record<Contact>>> {
        list_where(&self.repo, Filter::array_contains("tags", tag)?, None).await
    }

    /// Appends a note atomically.
    pub async fn add_note(&self, id: &str, note: Note) -> DbResult<Record<Contact>> {
        require("text", &note.text)?;
        let note = bson::to_bson(&note)?;
        self.repo.apply(id, Patch::new().push("notes", note)).await
    }
}
