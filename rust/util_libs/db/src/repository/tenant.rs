use bson::{Bson, Document};

use super::{BatchOp, Page, PageRequest, QueryOptions, Repository, Subscription};
use crate::error::{DbError, DbResult};
use crate::schemas::entity::{Entity, Record};
use crate::schemas::metadata::COMPANY_ID_FIELD;
use crate::store::{DocumentStore, Patch};

/// A repository bound to one company.
///
/// Every listing is filtered by `company_id`, new entities are written under
/// this company, and documents owned by another company behave as if they
/// did not exist.
pub struct TenantRepository<E, S> {
    repo: Repository<E, S>,
    company_id: String,
}

impl<E, S: Clone> Clone for TenantRepository<E, S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            company_id: self.company_id.clone(),
        }
    }
}

impl<E, S> std::fmt::Debug for TenantRepository<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRepository")
            .field("collection", &self.repo.collection)
            .field("company_id", &self.company_id)
            .finish()
    }
}

impl<E: Entity, S: DocumentStore> TenantRepository<E, S> {
    pub fn new(repo: Repository<E, S>, company_id: impl Into<String>) -> Self {
        Self {
            repo,
            company_id: company_id.into(),
        }
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    /// The unscoped repository underneath.
    pub fn repository(&self) -> &Repository<E, S> {
        &self.repo
    }

    fn owns(&self, record: &Record<E>) -> bool {
        record.data.company_id() == self.company_id
    }

    fn check_entity(&self, data: &E) -> DbResult<()> {
        let company_id = data.company_id();
        if !company_id.is_empty() && company_id != self.company_id {
            return Err(DbError::validation(format!(
                "entity belongs to company '{}', not '{}'",
                company_id, self.company_id
            )));
        }
        Ok(())
    }

    fn check_fields(&self, fields: &Document) -> DbResult<()> {
        match fields.get(COMPANY_ID_FIELD) {
            None => Ok(()),
            Some(Bson::String(company_id)) if *company_id == self.company_id => Ok(()),
            Some(other) => Err(DbError::validation(format!(
                "cannot move a document to company {} from company '{}'",
                other, self.company_id
            ))),
        }
    }

    async fn owned(&self, id: &str) -> DbResult<Record<E>> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(self.repo.collection(), id))
    }

    /// Creates an entity under this company. An entity without a company is
    /// assigned to it; one with a different company is rejected.
    pub async fn create(&self, data: E) -> DbResult<Record<E>> {
        self.check_entity(&data)?;
        let result = self
            .repo
            .insert_entity(None, &data, Some(&self.company_id))
            .await;
        self.repo.logged("create", result)
    }

    /// Creates or replaces document `id`. Replacing a document owned by
    /// another company fails with `NotFound`.
    pub async fn create_with_id(&self, id: impl Into<String>, data: E) -> DbResult<Record<E>> {
        let id = id.into();
        self.check_entity(&data)?;
        if let Some(existing) = self.repo.get_by_id(&id).await? {
            if !self.owns(&existing) {
                return Err(DbError::not_found(self.repo.collection(), id));
            }
        }
        let result = self
            .repo
            .insert_entity(Some(id), &data, Some(&self.company_id))
            .await;
        self.repo.logged("create_with_id", result)
    }

    /// `None` when the document is absent or owned by another company.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Record<E>>> {
        Ok(self
            .repo
            .get_by_id(id)
            .await?
            .filter(|record| self.owns(record)))
    }

    pub async fn update(&self, id: &str, partial: Document) -> DbResult<Record<E>> {
        self.check_fields(&partial)?;
        self.owned(id).await?;
        self.repo.update(id, partial).await
    }

    pub async fn apply(&self, id: &str, patch: Patch) -> DbResult<Record<E>> {
        self.check_fields(&patch.set)?;
        self.owned(id).await?;
        self.repo.apply(id, patch).await
    }

    /// Removes the document if it exists and belongs to this company.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(false);
        }
        self.repo.delete(id).await
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<Record<E>> {
        self.owned(id).await?;
        self.repo.soft_delete(id).await
    }

    pub async fn restore(&self, id: &str) -> DbResult<Record<E>> {
        self.owned(id).await?;
        self.repo.restore(id).await
    }

    pub async fn get_all(&self, options: &QueryOptions) -> DbResult<Vec<Record<E>>> {
        self.repo
            .get_all_by_company(&self.company_id, options)
            .await
    }

    pub async fn count(&self, options: &QueryOptions) -> DbResult<u64> {
        let scoped = options.clone().scoped_to(&self.company_id)?;
        self.repo.count(&scoped).await
    }

    pub async fn get_paginated(&self, request: &PageRequest) -> DbResult<Page<Record<E>>> {
        let scoped = PageRequest {
            options: request.options.clone().scoped_to(&self.company_id)?,
            ..request.clone()
        };
        self.repo.get_paginated(&scoped).await
    }

    /// Like [`Repository::subscribe_to_document`], reporting `None` while the
    /// document is owned by another company.
    pub async fn subscribe_to_document<F>(&self, id: &str, mut callback: F) -> DbResult<Subscription>
    where
        F: FnMut(Option<Record<E>>) + Send + 'static,
    {
        let company_id = self.company_id.clone();
        self.repo
            .subscribe_to_document(id, move |record| {
                callback(record.filter(|r| r.data.company_id() == company_id))
            })
            .await
    }

    pub async fn subscribe_to_collection<F>(
        &self,
        options: QueryOptions,
        callback: F,
    ) -> DbResult<Subscription>
    where
        F: FnMut(Vec<Record<E>>) + Send + 'static,
    {
        let scoped = options.scoped_to(&self.company_id)?;
        self.repo.subscribe_to_collection(scoped, callback).await
    }

    /// Atomic batch under this company. Every targeted document must belong
    /// to it and every created entity must belong to it or to no company.
    pub async fn batch_write(&self, operations: Vec<BatchOp<E>>) -> DbResult<Vec<String>> {
        for op in &operations {
            match op {
                BatchOp::Create(data) => self.check_entity(data)?,
                BatchOp::CreateWithId(id, data) => {
                    self.check_entity(data)?;
                    if let Some(existing) = self.repo.get_by_id(id).await? {
                        if !self.owns(&existing) {
                            return Err(DbError::not_found(self.repo.collection(), id));
                        }
                    }
                }
                BatchOp::Update(id, partial) => {
                    self.check_fields(partial)?;
                    self.owned(id).await?;
                }
                BatchOp::Delete(id) | BatchOp::SoftDelete(id) => {
                    self.owned(id).await?;
                }
            }
        }
        let result = self
            .repo
            .commit_batch(operations, Some(&self.company_id))
            .await;
        self.repo.logged("batch_write", result)
    }
}
