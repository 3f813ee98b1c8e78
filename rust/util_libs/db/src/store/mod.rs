//! Backend contract for document stores.
//!
//! Stores work on raw `bson::Document`s; typing and lifecycle rules live in the
//! repository. A store is responsible for id generation, stamping the fields a
//! write asks it to stamp with its own commit time, atomic array appends, and
//! all-or-nothing batch commits.
pub mod memory;

use async_trait::async_trait;
use bson::{Bson, DateTime, Document};
use futures::stream::BoxStream;

use crate::error::DbResult;
use crate::query::{keyset_document, with_tie_break, Filter, Sort};

pub use memory::MemoryStore;

/// Index definition applied to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Document,
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, keys: Document) -> Self {
        Self {
            name: name.into(),
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCapabilities {
    /// The store can skip `n` rows server-side. Stores without it only offer
    /// resume cursors, and the repository emulates offsets by scanning.
    pub native_offset: bool,
}

/// A fully-resolved read against one collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Conjunction of filters.
    pub filters: Vec<Filter>,
    pub sort: Vec<Sort>,
    pub limit: Option<u64>,
    /// Rows to skip. Rejected by stores without `native_offset`.
    pub offset: Option<u64>,
    /// Only return documents ordered strictly after this document.
    pub start_after: Option<Document>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// The caller's sort followed by the `_id` tie-break.
    pub fn ordering(&self) -> Vec<Sort> {
        with_tie_break(&self.sort)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }

    /// MongoDB filter document for this query, including the keyset predicate
    /// for `start_after`.
    pub fn filter_document(&self) -> Document {
        let mut clauses: Vec<Document> = self.filters.iter().map(Filter::to_document).collect();
        if let Some(cursor) = &self.start_after {
            clauses.push(keyset_document(&self.ordering(), cursor));
        }
        match clauses.len() {
            0 => Document::new(),
            1 => clauses.remove(0),
            _ => bson::doc! { "$and": clauses },
        }
    }
}

/// Field-level update of a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub set: Document,
    pub unset: Vec<String>,
    /// Atomic appends, applied in order.
    pub push: Vec<(String, Bson)>,
    /// Fields set to the store's commit time.
    pub stamp: Vec<String>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn merge(mut self, fields: Document) -> Self {
        self.set.extend(fields);
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push.push((field.into(), value.into()));
        self
    }

    pub fn stamp(mut self, field: impl Into<String>) -> Self {
        self.stamp.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.push.is_empty() && self.stamp.is_empty()
    }

    /// `set` with every stamped field resolved to `now`.
    pub fn resolved_set(&self, now: DateTime) -> Document {
        let mut set = self.set.clone();
        for field in &self.stamp {
            set.insert(field.clone(), now);
        }
        set
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a document. With an id, replaces any existing document.
    Insert {
        id: Option<String>,
        document: Document,
        stamp: Vec<String>,
    },
    /// Update an existing document; the batch fails if it is absent.
    Patch { id: String, patch: Patch },
    Remove { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Replaced,
    Removed,
    /// Anything else (drops, invalidations, missed notifications).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: String,
    /// `None` when the store cannot tell which document changed.
    pub id: Option<String>,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Whether the event may affect document `id`.
    pub fn concerns(&self, id: &str) -> bool {
        self.id.as_deref().map_or(true, |changed| changed == id)
    }
}

pub type ChangeStream = BoxStream<'static, DbResult<ChangeEvent>>;

/// Sets `fields` to `now` in `document`.
pub fn stamp_document(document: &mut Document, fields: &[String], now: DateTime) {
    for field in fields {
        document.insert(field.clone(), now);
    }
}

#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    fn capabilities(&self) -> StoreCapabilities;

    /// Inserts `document`, stamping `stamp` fields with the commit time.
    /// Without an id the store generates one; with an id any existing document
    /// is replaced. Returns the committed document including `_id`.
    async fn insert(
        &self,
        collection: &str,
        id: Option<String>,
        document: Document,
        stamp: Vec<String>,
    ) -> DbResult<Document>;

    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Document>>;

    /// Applies `patch` and returns the updated document, or `None` if absent.
    async fn patch(&self, collection: &str, id: &str, patch: Patch)
        -> DbResult<Option<Document>>;

    /// Removes the document; returns whether it existed.
    async fn remove(&self, collection: &str, id: &str) -> DbResult<bool>;

    async fn find(&self, collection: &str, query: &Query) -> DbResult<Vec<Document>>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> DbResult<u64>;

    /// Commits all writes atomically with one commit time. Returns the id each
    /// write touched, in order.
    async fn commit(&self, collection: &str, writes: Vec<Write>) -> DbResult<Vec<String>>;

    /// Change notifications for a collection.
    async fn watch(&self, collection: &str) -> DbResult<ChangeStream>;

    async fn ensure_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DbResult<()>;
}
