//! In-memory implementation of the document store.
//!
//! Collections are `BTreeMap`s keyed by document id behind one
//! `tokio::sync::RwLock`, so a batch commit is atomic with respect to every
//! other operation: the whole batch is validated before anything is applied.
//! Change notifications fan out through a `broadcast` channel.
//!
//! The store is cursor-only by default (no server-side offset), which is the
//! model the repository's pagination emulation is written against. Use
//! [`MemoryStore::with_native_offset`] to exercise the offset path.
//!
//! Not durable: all state is lost when the last clone is dropped.
use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, DateTime, Document};
use futures::StreamExt;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::{
    stamp_document, ChangeEvent, ChangeKind, ChangeStream, DocumentStore, IndexSpec, Patch, Query,
    StoreCapabilities, Write,
};
use crate::error::{DbError, DbResult};
use crate::query::{compare_documents, lookup, values_equal, Filter, ID_FIELD};

const EVENT_CAPACITY: usize = 1024;

type Collection = BTreeMap<String, Document>;

struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    indexes: RwLock<HashMap<String, Vec<IndexSpec>>>,
    events: broadcast::Sender<ChangeEvent>,
    capabilities: StoreCapabilities,
    /// Last commit time handed out, in milliseconds.
    clock: AtomicI64,
    failing_commits: AtomicUsize,
    unavailable: AtomicBool,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("capabilities", &self.inner.capabilities)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capabilities(StoreCapabilities::default())
    }

    pub fn with_native_offset() -> Self {
        Self::with_capabilities(StoreCapabilities {
            native_offset: true,
        })
    }

    fn with_capabilities(capabilities: StoreCapabilities) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                indexes: RwLock::new(HashMap::new()),
                events,
                capabilities,
                clock: AtomicI64::new(0),
                failing_commits: AtomicUsize::new(0),
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Makes the next `count` batch commits fail before applying anything.
    pub fn fail_next_commits(&self, count: usize) {
        self.inner.failing_commits.store(count, AtomicOrdering::SeqCst);
    }

    /// While set, every operation fails with a store error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Indexes registered for a collection.
    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.inner
            .indexes
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of stored documents in a collection, deleted or not.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn check_available(&self, operation: &str) -> DbResult<()> {
        if self.inner.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(DbError::store(
                "memory store is unavailable",
                Some(operation.to_string()),
            ));
        }
        Ok(())
    }

    // Strictly increasing so consecutive commits never share a timestamp.
    fn commit_time(&self) -> DateTime {
        let now = DateTime::now().timestamp_millis();
        let mut previous = self.inner.clock.load(AtomicOrdering::SeqCst);
        loop {
            let next = now.max(previous + 1);
            match self.inner.clock.compare_exchange(
                previous,
                next,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => return DateTime::from_millis(next),
                Err(actual) => previous = actual,
            }
        }
    }

    fn notify(&self, collection: &str, id: &str, kind: ChangeKind) {
        // No receivers is not an error.
        let _ = self.inner.events.send(ChangeEvent {
            collection: collection.to_string(),
            id: Some(id.to_string()),
            kind,
        });
    }
}

// Missing fields count as null, as in a MongoDB unique index.
fn same_key(a: Option<&Bson>, b: Option<&Bson>) -> bool {
    match (a, b) {
        (None | Some(Bson::Null), None | Some(Bson::Null)) => true,
        (Some(x), Some(y)) => values_equal(x, y),
        _ => false,
    }
}

fn check_unique(
    collection: &str,
    indexes: &[IndexSpec],
    documents: &Collection,
    id: &str,
    document: &Document,
) -> DbResult<()> {
    for index in indexes.iter().filter(|index| index.unique) {
        let clash = documents.iter().any(|(other_id, other)| {
            other_id != id
                && index
                    .keys
                    .keys()
                    .all(|field| same_key(lookup(document, field), lookup(other, field)))
        });
        if clash {
            return Err(DbError::validation(format!(
                "duplicate key in {} for unique index '{}'",
                collection, index.name
            )));
        }
    }
    Ok(())
}

fn apply_patch(document: &mut Document, patch: &Patch, now: DateTime) {
    for (field, value) in patch.resolved_set(now) {
        set_path(document, &field, value);
    }
    for field in &patch.unset {
        unset_path(document, field);
    }
    for (field, value) in &patch.push {
        match get_path_mut(document, field) {
            Some(Bson::Array(items)) => items.push(value.clone()),
            _ => set_path(document, field, Bson::Array(vec![value.clone()])),
        }
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let needs_document = !matches!(document.get(head), Some(Bson::Document(_)));
            if needs_document {
                document.insert(head.to_string(), Document::new());
            }
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

fn get_path_mut<'a>(document: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => document.get_mut(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(child) => get_path_mut(child, rest),
            _ => None,
        },
    }
}

fn new_id() -> String {
    ObjectId::new().to_hex()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities
    }

    async fn insert(
        &self,
        collection: &str,
        id: Option<String>,
        mut document: Document,
        stamp: Vec<String>,
    ) -> DbResult<Document> {
        self.check_available("insert")?;
        let id = id.unwrap_or_else(new_id);
        stamp_document(&mut document, &stamp, self.commit_time());
        document.insert(ID_FIELD, id.clone());

        let indexes = self.indexes(collection).await;
        let mut collections = self.inner.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        check_unique(collection, &indexes, documents, &id, &document)?;
        let replaced = documents.insert(id.clone(), document.clone()).is_some();
        drop(collections);

        let kind = if replaced {
            ChangeKind::Replaced
        } else {
            ChangeKind::Inserted
        };
        self.notify(collection, &id, kind);
        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        self.check_available("get")?;
        let collections = self.inner.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DbResult<Option<Document>> {
        self.check_available("patch")?;
        let now = self.commit_time();
        let indexes = self.indexes(collection).await;
        let mut collections = self.inner.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(mut updated) = documents.get(id).cloned() else {
            return Ok(None);
        };
        apply_patch(&mut updated, &patch, now);
        check_unique(collection, &indexes, documents, id, &updated)?;
        documents.insert(id.to_string(), updated.clone());
        drop(collections);

        self.notify(collection, id, ChangeKind::Updated);
        Ok(Some(updated))
    }

    async fn remove(&self, collection: &str, id: &str) -> DbResult<bool> {
        self.check_available("remove")?;
        let mut collections = self.inner.collections.write().await;
        let existed = collections
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some();
        drop(collections);

        if existed {
            self.notify(collection, id, ChangeKind::Removed);
        }
        Ok(existed)
    }

    async fn find(&self, collection: &str, query: &Query) -> DbResult<Vec<Document>> {
        self.check_available("find")?;
        if query.offset.is_some() && !self.inner.capabilities.native_offset {
            return Err(DbError::invalid_query(
                "this store does not support offset queries; use a resume cursor",
            ));
        }

        let ordering = query.ordering();
        let mut matched: Vec<Document> = {
            let collections = self.inner.collections.read().await;
            collections
                .get(collection)
                .map(|c| c.values().filter(|d| query.matches(d)).cloned().collect())
                .unwrap_or_default()
        };
        matched.sort_by(|a, b| compare_documents(a, b, &ordering));

        if let Some(cursor) = &query.start_after {
            matched.retain(|d| compare_documents(d, cursor, &ordering) == Ordering::Greater);
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> DbResult<u64> {
        self.check_available("count")?;
        let collections = self.inner.collections.read().await;
        let count = collections.get(collection).map_or(0, |c| {
            c.values()
                .filter(|d| filters.iter().all(|f| f.matches(d)))
                .count()
        });
        Ok(count as u64)
    }

    async fn commit(&self, collection: &str, writes: Vec<Write>) -> DbResult<Vec<String>> {
        self.check_available("commit")?;
        let failing = self.inner.failing_commits.load(AtomicOrdering::SeqCst);
        if failing > 0 {
            self.inner
                .failing_commits
                .store(failing - 1, AtomicOrdering::SeqCst);
            return Err(DbError::store(
                "batch commit rejected by store",
                Some("commit".to_string()),
            ));
        }

        let now = self.commit_time();
        let indexes = self.indexes(collection).await;
        let mut collections = self.inner.collections.write().await;
        let current = collections.get(collection).cloned().unwrap_or_default();

        // Apply to a copy; swap it in only when every write succeeded.
        let mut staged = current;
        let mut touched = Vec::with_capacity(writes.len());
        let mut events = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                Write::Insert {
                    id,
                    mut document,
                    stamp,
                } => {
                    let id = id.unwrap_or_else(new_id);
                    stamp_document(&mut document, &stamp, now);
                    document.insert(ID_FIELD, id.clone());
                    check_unique(collection, &indexes, &staged, &id, &document)?;
                    let kind = match staged.insert(id.clone(), document) {
                        Some(_) => ChangeKind::Replaced,
                        None => ChangeKind::Inserted,
                    };
                    events.push((id.clone(), kind));
                    touched.push(id);
                }
                Write::Patch { id, patch } => {
                    let mut document = staged
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| DbError::not_found(collection, id.clone()))?;
                    apply_patch(&mut document, &patch, now);
                    check_unique(collection, &indexes, &staged, &id, &document)?;
                    staged.insert(id.clone(), document);
                    events.push((id.clone(), ChangeKind::Updated));
                    touched.push(id);
                }
                Write::Remove { id } => {
                    if staged.remove(&id).is_some() {
                        events.push((id.clone(), ChangeKind::Removed));
                    }
                    touched.push(id);
                }
            }
        }
        collections.insert(collection.to_string(), staged);
        drop(collections);

        for (id, kind) in events {
            self.notify(collection, &id, kind);
        }
        Ok(touched)
    }

    async fn watch(&self, collection: &str) -> DbResult<ChangeStream> {
        self.check_available("watch")?;
        let receiver = self.inner.events.subscribe();
        let collection = collection.to_string();
        let stream = futures::stream::unfold(
            (receiver, collection),
            |(mut receiver, collection)| async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) if event.collection == collection => {
                            return Some((Ok(event), (receiver, collection)));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            log::warn!(
                                "Change listener on '{}' missed {} notifications",
                                collection,
                                missed
                            );
                            let event = ChangeEvent {
                                collection: collection.clone(),
                                id: None,
                                kind: ChangeKind::Other,
                            };
                            return Some((Ok(event), (receiver, collection)));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    async fn ensure_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DbResult<()> {
        self.check_available("ensure_indexes")?;
        let mut registered = self.inner.indexes.write().await;
        let entry = registered.entry(collection.to_string()).or_default();
        for index in indexes {
            if !entry.iter().any(|existing| existing.name == index.name) {
                entry.push(index);
            }
        }
        Ok(())
    }
}
