use crm_db::{
    query::{Filter, Sort},
    repository::{Repository, TenantRepository},
    schemas::{Property, PropertyStatus, Record},
    store::DocumentStore,
    DbError, DbResult,
};

use crate::common::{list_by, list_where, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct PropertyService<S> {
    repo: TenantRepository<Property, S>,
}

impl<S: DocumentStore> CrmService<Property, S> for PropertyService<S> {
    fn repo(&self) -> &TenantRepository<Property, S> {
        &self.repo
    }
}

impl<S: DocumentStore> PropertyService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, property: Property) -> DbResult<Record<Property>> {
        require("title", &property.title)?;
        if property.price < 0.0 {
            return Err(DbError::validation("price cannot be negative"));
        }
        self.repo.create(property).await
    }

    pub async fn by_status(&self, status: PropertyStatus) -> DbResult<Vec<Record<Property>>> {
        list_by(&self.repo, "status", status.to_string()).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Property>> {
        set_status::<PropertyStatus, _, _>(&self.repo, id, "status", "property", status).await
    }

    /// Properties priced within `[min, max]`, cheapest first.
    pub async fn in_price_range(&self, min: f64, max: f64) -> DbResult<Vec<Record<Property>>> {
        if max < min {
            return Err(DbError::validation("price range maximum is below minimum"));
        }
        list_where(
            &self.repo,
            Filter::between("price", min, max)?,
            Some(Sort::asc("price")),
        )
        .await
    }

    pub async fn by_listing_agent(&self, agent_id: &str) -> DbResult<Vec<Record<Property>>> {
        list_by(&self.repo, "listingAgent", agent_id).await
    }
}
