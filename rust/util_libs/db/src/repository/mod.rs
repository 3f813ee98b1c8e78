//! Generic entity repository.
//!
//! [`Repository`] binds an [`Entity`] type to its collection on a
//! [`DocumentStore`]. It owns the lifecycle fields: timestamps are stamped by
//! the store at commit time, soft-delete flips `isDeleted`/`deletedAt`, and
//! listings hide soft-deleted documents unless asked not to.
pub mod batch;
pub mod options;
pub mod pagination;
pub mod subscription;
pub mod tenant;

pub use batch::BatchOp;
pub use options::QueryOptions;
pub use pagination::{Page, PageInfo, PageRequest, DEFAULT_PAGE_SIZE};
pub use subscription::Subscription;
pub use tenant::TenantRepository;

use bson::{doc, Bson, Document};
use futures::StreamExt;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{DbError, DbResult};
use crate::query::ID_FIELD;
use crate::schemas::entity::{entity_document, Entity, Record};
use crate::schemas::metadata::{
    COMPANY_ID_FIELD, CREATED_AT_FIELD, DELETED_AT_FIELD, IS_DELETED_FIELD, METADATA_FIELDS,
    UPDATED_AT_FIELD,
};
use crate::store::{DocumentStore, IndexSpec, Patch, Query, Write};

/// Index every collection gets for tenant-scoped listings.
pub const TENANT_INDEX_NAME: &str = "company_deleted_index";

pub struct Repository<E, S> {
    store: S,
    collection: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S: Clone> Clone for Repository<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E, S> fmt::Debug for Repository<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .finish()
    }
}

impl<E: Entity, S: DocumentStore> Repository<E, S> {
    /// Repository over the entity's own collection.
    pub fn new(store: S) -> Self {
        Self::with_collection(store, E::COLLECTION)
    }

    pub fn with_collection(store: S, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Binds this repository to one tenant.
    pub fn for_company(&self, company_id: impl Into<String>) -> TenantRepository<E, S> {
        TenantRepository::new(self.clone(), company_id)
    }

    fn logged<T>(&self, operation: &str, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            log::error!(
                "Repository operation '{}' on collection '{}' failed: {}",
                operation,
                self.collection,
                e
            );
        }
        result
    }

    /// Applies the tenant index and the entity's own indexes.
    pub async fn ensure_indexes(&self) -> DbResult<()> {
        let mut indexes = vec![IndexSpec::new(
            TENANT_INDEX_NAME,
            doc! { COMPANY_ID_FIELD: 1, IS_DELETED_FIELD: 1 },
        )];
        indexes.extend(E::default().into_indices());
        let result = self.store.ensure_indexes(&self.collection, indexes).await;
        self.logged("ensure_indexes", result)
    }

    /// Creates a document with a store-generated id. Lifecycle fields in the
    /// input are overwritten. Returns the committed record.
    pub async fn create(&self, data: E) -> DbResult<Record<E>> {
        let result = self.insert_entity(None, &data, None).await;
        self.logged("create", result)
    }

    /// Creates or replaces the document `id`. There is no uniqueness check:
    /// the last write wins.
    pub async fn create_with_id(&self, id: impl Into<String>, data: E) -> DbResult<Record<E>> {
        let result = self.insert_entity(Some(id.into()), &data, None).await;
        self.logged("create_with_id", result)
    }

    pub(crate) async fn insert_entity(
        &self,
        id: Option<String>,
        data: &E,
        company_id: Option<&str>,
    ) -> DbResult<Record<E>> {
        if let Some(id) = &id {
            check_id(id)?;
        }
        let document = new_document(data, company_id)?;
        let committed = self
            .store
            .insert(&self.collection, id, document, creation_stamps())
            .await?;
        let record = Record::from_document(committed)?;
        log::info!("Created {} document {}", self.collection, record.id);
        Ok(record)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Record<E>>> {
        let result = async {
            match self.store.get(&self.collection, id).await? {
                Some(document) => Record::from_document(document).map(Some),
                None => Ok(None),
            }
        }
        .await;
        self.logged("get_by_id", result)
    }

    /// Merges `partial` into the document and stamps `updatedAt`. Business
    /// rules are not checked. Fails with `NotFound` if the document is absent.
    pub async fn update(&self, id: &str, partial: Document) -> DbResult<Record<E>> {
        let result = async {
            let patch = update_patch(partial)?;
            self.patch_existing(id, patch).await
        }
        .await;
        self.logged("update", result)
    }

    /// Applies a field-level patch: merge, unset and atomic array appends.
    pub async fn apply(&self, id: &str, patch: Patch) -> DbResult<Record<E>> {
        let result = async {
            check_patch(&patch)?;
            self.patch_existing(id, patch.stamp(UPDATED_AT_FIELD)).await
        }
        .await;
        self.logged("apply", result)
    }

    /// Permanently removes the document. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = self.store.remove(&self.collection, id).await;
        if let Ok(true) = result {
            log::info!("Deleted {} document {}", self.collection, id);
        }
        self.logged("delete", result)
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<Record<E>> {
        let result = self.patch_existing(id, soft_delete_patch()).await;
        self.logged("soft_delete", result)
    }

    pub async fn restore(&self, id: &str) -> DbResult<Record<E>> {
        let result = self.patch_existing(id, restore_patch()).await;
        self.logged("restore", result)
    }

    async fn patch_existing(&self, id: &str, patch: Patch) -> DbResult<Record<E>> {
        let updated = self
            .store
            .patch(&self.collection, id, patch)
            .await?
            .ok_or_else(|| DbError::not_found(&self.collection, id))?;
        log::info!("Updated {} document {}", self.collection, id);
        Record::from_document(updated)
    }

    /// Lists matching records. Soft-deleted records are excluded unless
    /// `options.include_deleted` is set.
    pub async fn get_all(&self, options: &QueryOptions) -> DbResult<Vec<Record<E>>> {
        let result = async {
            let query = Query {
                filters: options.effective_filters()?,
                sort: options.sort.clone(),
                limit: options.limit,
                offset: None,
                start_after: options.start_after.clone(),
            };
            log::debug!(
                "Listing {} with filter {:?}",
                self.collection,
                query.filter_document()
            );
            self.find_records(&query).await
        }
        .await;
        self.logged("get_all", result)
    }

    /// [`Repository::get_all`] restricted to one company.
    pub async fn get_all_by_company(
        &self,
        company_id: &str,
        options: &QueryOptions,
    ) -> DbResult<Vec<Record<E>>> {
        let scoped = options.clone().scoped_to(company_id);
        match scoped {
            Ok(scoped) => self.get_all(&scoped).await,
            Err(e) => self.logged("get_all_by_company", Err(e)),
        }
    }

    /// Number of records a listing with `options` would return, ignoring
    /// `limit` and `start_after`.
    pub async fn count(&self, options: &QueryOptions) -> DbResult<u64> {
        let result = async {
            let filters = options.effective_filters()?;
            self.store.count(&self.collection, &filters).await
        }
        .await;
        self.logged("count", result)
    }

    /// Offset pagination.
    ///
    /// The requested page is clamped to the available pages. Stores with a
    /// native offset skip rows server-side. On cursor-only stores the rows
    /// before the page are scanned with the same ordering and the last one is
    /// used as the resume cursor, which costs O(offset) per page.
    pub async fn get_paginated(&self, request: &PageRequest) -> DbResult<Page<Record<E>>> {
        let result = self.paginate(request).await;
        self.logged("get_paginated", result)
    }

    async fn paginate(&self, request: &PageRequest) -> DbResult<Page<Record<E>>> {
        if request.page_size == 0 {
            return Err(DbError::validation("page size must be at least 1"));
        }
        let filters = request.options.effective_filters()?;
        let total_items = self.store.count(&self.collection, &filters).await?;
        let pagination = PageInfo::resolve(request.page, request.page_size, total_items);

        let base = Query {
            filters,
            sort: request.options.sort.clone(),
            ..Default::default()
        };
        let offset = pagination.offset();
        log::debug!(
            "Paginating {}: page {} of {} (offset {})",
            self.collection,
            pagination.page,
            pagination.total_pages,
            offset
        );

        let items = if offset == 0 {
            self.find_records(&base.limit(pagination.page_size)).await?
        } else if self.store.capabilities().native_offset {
            self.find_records(&base.offset(offset).limit(pagination.page_size))
                .await?
        } else {
            let skipped = self
                .store
                .find(&self.collection, &base.clone().limit(offset))
                .await?;
            match skipped.into_iter().last() {
                Some(cursor) => {
                    self.find_records(&base.start_after(cursor).limit(pagination.page_size))
                        .await?
                }
                None => Vec::new(),
            }
        };

        Ok(Page { items, pagination })
    }

    async fn find_records(&self, query: &Query) -> DbResult<Vec<Record<E>>> {
        self.store
            .find(&self.collection, query)
            .await?
            .into_iter()
            .map(Record::from_document)
            .collect()
    }

    /// Calls `callback` with the current record right away, then again after
    /// every change to it (`None` once it is removed).
    ///
    /// The listener stops when the change stream fails or ends.
    pub async fn subscribe_to_document<F>(&self, id: &str, mut callback: F) -> DbResult<Subscription>
    where
        F: FnMut(Option<Record<E>>) + Send + 'static,
    {
        let result = async {
            // Watch before the first read so no change falls in between.
            let mut changes = self.store.watch(&self.collection).await?;
            let current = self.get_by_id(id).await?;
            callback(current);

            log::debug!("Subscribed to {}/{}", self.collection, id);
            let repo = self.clone();
            let id = id.to_string();
            let handle = tokio::spawn(async move {
                while let Some(change) = changes.next().await {
                    let change = match change {
                        Ok(change) => change,
                        Err(e) => {
                            log::error!(
                                "Subscription to {}/{} ended: {}",
                                repo.collection,
                                id,
                                e
                            );
                            break;
                        }
                    };
                    if !change.concerns(&id) {
                        continue;
                    }
                    match repo.get_by_id(&id).await {
                        Ok(current) => callback(current),
                        Err(_) => break,
                    }
                }
                log::debug!("Subscription to {}/{} stopped", repo.collection, id);
            });
            Ok(Subscription::new(handle))
        }
        .await;
        self.logged("subscribe_to_document", result)
    }

    /// Calls `callback` with the current listing right away, then again after
    /// every change in the collection.
    pub async fn subscribe_to_collection<F>(
        &self,
        options: QueryOptions,
        mut callback: F,
    ) -> DbResult<Subscription>
    where
        F: FnMut(Vec<Record<E>>) + Send + 'static,
    {
        let result = async {
            let mut changes = self.store.watch(&self.collection).await?;
            let current = self.get_all(&options).await?;
            callback(current);

            let repo = self.clone();
            let handle = tokio::spawn(async move {
                while let Some(change) = changes.next().await {
                    if let Err(e) = change {
                        log::error!("Subscription to {} ended: {}", repo.collection, e);
                        break;
                    }
                    match repo.get_all(&options).await {
                        Ok(current) => callback(current),
                        Err(_) => break,
                    }
                }
                log::debug!("Subscription to {} stopped", repo.collection);
            });
            log::debug!("Subscribed to {}", self.collection);
            Ok(Subscription::new(handle))
        }
        .await;
        self.logged("subscribe_to_collection", result)
    }

    /// Commits all operations atomically with one commit timestamp. Returns
    /// the id each operation touched, in order. If the commit fails nothing is
    /// applied.
    pub async fn batch_write(&self, operations: Vec<BatchOp<E>>) -> DbResult<Vec<String>> {
        let result = self.commit_batch(operations, None).await;
        self.logged("batch_write", result)
    }

    pub(crate) async fn commit_batch(
        &self,
        operations: Vec<BatchOp<E>>,
        company_id: Option<&str>,
    ) -> DbResult<Vec<String>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        let writes = operations
            .into_iter()
            .map(|op| batch_write(op, company_id))
            .collect::<DbResult<Vec<Write>>>()?;
        let count = writes.len();
        let ids = self.store.commit(&self.collection, writes).await?;
        log::info!("Committed batch of {} writes to {}", count, self.collection);
        Ok(ids)
    }
}

fn check_id(id: &str) -> DbResult<()> {
    if id.trim().is_empty() || id.contains('/') {
        return Err(DbError::validation(format!("invalid document id '{}'", id)));
    }
    Ok(())
}

fn creation_stamps() -> Vec<String> {
    vec![CREATED_AT_FIELD.to_string(), UPDATED_AT_FIELD.to_string()]
}

/// Stored form of a new entity: domain fields plus fresh lifecycle fields.
/// `company_id`, when given, overrides the entity's own tenant.
fn new_document<E: Entity>(data: &E, company_id: Option<&str>) -> DbResult<Document> {
    let mut document = entity_document(data)?;
    if let Some(company_id) = company_id {
        document.insert(COMPANY_ID_FIELD, company_id);
    }
    document.insert(IS_DELETED_FIELD, false);
    document.insert(DELETED_AT_FIELD, Bson::Null);
    Ok(document)
}

/// Rejects updates to fields the repository owns.
fn check_owned_fields<'a>(fields: impl IntoIterator<Item = &'a String>) -> DbResult<()> {
    for field in fields {
        let root = field.split('.').next().unwrap_or(field);
        if root == ID_FIELD || METADATA_FIELDS.contains(&root) {
            return Err(DbError::validation(format!(
                "field '{}' is managed by the repository and cannot be updated",
                field
            )));
        }
    }
    Ok(())
}

fn check_patch(patch: &Patch) -> DbResult<()> {
    check_owned_fields(
        patch
            .set
            .keys()
            .chain(&patch.unset)
            .chain(patch.push.iter().map(|(field, _)| field))
            .chain(&patch.stamp),
    )
}

fn update_patch(partial: Document) -> DbResult<Patch> {
    check_owned_fields(partial.keys())?;
    Ok(Patch::new().merge(partial).stamp(UPDATED_AT_FIELD))
}

fn soft_delete_patch() -> Patch {
    Patch::new()
        .set(IS_DELETED_FIELD, true)
        .stamp(DELETED_AT_FIELD)
        .stamp(UPDATED_AT_FIELD)
}

fn restore_patch() -> Patch {
    Patch::new()
        .set(IS_DELETED_FIELD, false)
        .set(DELETED_AT_FIELD, Bson::Null)
        .stamp(UPDATED_AT_FIELD)
}

fn batch_write<E: Entity>(op: BatchOp<E>, company_id: Option<&str>) -> DbResult<Write> {
    Ok(match op {
        BatchOp::Create(data) => Write::Insert {
            id: None,
            document: new_document(&data, company_id)?,
            stamp: creation_stamps(),
        },
        BatchOp::CreateWithId(id, data) => {
            check_id(&id)?;
            Write::Insert {
                id: Some(id),
                document: new_document(&data, company_id)?,
                stamp: creation_stamps(),
            }
        }
        BatchOp::Update(id, partial) => Write::Patch {
            id,
            patch: update_patch(partial)?,
        },
        BatchOp::Delete(id) => Write::Remove { id },
        BatchOp::SoftDelete(id) => Write::Patch {
            id,
            patch: soft_delete_patch(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_fields_are_rejected_in_updates() {
        assert!(update_patch(doc! { "title": "x" }).is_ok());
        for field in ["_id", "isDeleted", "createdAt", "updatedAt", "deletedAt"] {
            let mut partial = Document::new();
            partial.insert(field, 1);
            assert!(update_patch(partial).unwrap_err().is_validation(), "{}", field);
        }
    }

    #[test]
    fn soft_delete_and_restore_patches_touch_only_lifecycle_fields() {
        let delete = soft_delete_patch();
        assert_eq!(delete.set, doc! { "isDeleted": true });
        assert_eq!(delete.stamp, vec!["deletedAt", "updatedAt"]);

        let restore = restore_patch();
        assert_eq!(restore.set, doc! { "isDeleted": false, "deletedAt": Bson::Null });
        assert_eq!(restore.stamp, vec!["updatedAt"]);
    }
}
