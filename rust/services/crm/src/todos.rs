use crm_db::{
    repository::{Repository, TenantRepository},
    schemas::{Record, Todo, TodoStatus},
    store::{DocumentStore, Patch},
    DbResult,
};

use crate::common::{list_by, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct TodoService<S> {
    repo: TenantRepository<Todo, S>,
}

impl<S: DocumentStore> CrmService<Todo, S> for TodoService<S> {
    fn repo(&self) -> &TenantRepository<Todo, S> {
        &self.repo
    }
}

impl<S: DocumentStore> TodoService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, todo: Todo) -> DbResult<Record<Todo>> {
        require("title", &todo.title)?;
        self.repo.create(todo).await
    }

    pub async fn by_status(&self, status: TodoStatus) -> DbResult<Vec<Record<Todo>>> {
        list_by(&self.repo, "status", status.to_string()).await
    }

    pub async fn assigned_to(&self, user_id: &str) -> DbResult<Vec<Record<Todo>>> {
        list_by(&self.repo, "assignedTo", user_id).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Todo>> {
        set_status::<TodoStatus, _, _>(&self.repo, id, "status", "todo", status).await
    }

    /// Marks the todo completed, stamping `completedAt` with the commit time.
    pub async fn complete(&self, id: &str) -> DbResult<Record<Todo>> {
        let patch = Patch::new()
            .set("status", TodoStatus::Completed.to_string())
            .stamp("completedAt");
        self.repo.apply(id, patch).await
    }
}
