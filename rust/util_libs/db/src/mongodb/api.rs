use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, DateTime, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    change_stream::event::{ChangeStreamEvent, OperationType},
    options::ReturnDocument,
    ClientSession,
};

use super::{collection::MongoCollection, MongoStore};
use crate::error::{DbError, DbResult};
use crate::query::{sort_document, Filter, ID_FIELD};
use crate::store::{
    stamp_document, ChangeEvent, ChangeKind, ChangeStream, DocumentStore, IndexSpec, Patch, Query,
    StoreCapabilities, Write,
};

fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn filters_document(filters: &[Filter]) -> Document {
    Query {
        filters: filters.to_vec(),
        ..Default::default()
    }
    .filter_document()
}

fn change_event(collection: &str, event: ChangeStreamEvent<Document>) -> ChangeEvent {
    let kind = match event.operation_type {
        OperationType::Insert => ChangeKind::Inserted,
        OperationType::Update => ChangeKind::Updated,
        OperationType::Replace => ChangeKind::Replaced,
        OperationType::Delete => ChangeKind::Removed,
        _ => ChangeKind::Other,
    };
    let id = event
        .document_key
        .as_ref()
        .and_then(|key| key.get(ID_FIELD))
        .and_then(|id| match id {
            Bson::String(id) => Some(id.clone()),
            Bson::ObjectId(oid) => Some(oid.to_hex()),
            _ => None,
        });
    ChangeEvent {
        collection: collection.to_string(),
        id,
        kind,
    }
}

impl MongoStore {
    async fn apply_writes(
        &self,
        collection: &MongoCollection,
        session: &mut ClientSession,
        writes: Vec<Write>,
        now: DateTime,
    ) -> DbResult<Vec<String>> {
        let mut touched = Vec::with_capacity(writes.len());
        for write in writes {
            match write {
                Write::Insert {
                    id,
                    mut document,
                    stamp,
                } => {
                    stamp_document(&mut document, &stamp, now);
                    let id = match id {
                        Some(id) => {
                            document.insert(ID_FIELD, id.clone());
                            collection
                                .inner
                                .replace_one(MongoCollection::id_filter(&id), document)
                                .upsert(true)
                                .session(&mut *session)
                                .await
                                .map_err(|e| collection.handle_db_error("commit replace", e))?;
                            id
                        }
                        None => {
                            let id = new_id();
                            document.insert(ID_FIELD, id.clone());
                            collection
                                .inner
                                .insert_one(document)
                                .session(&mut *session)
                                .await
                                .map_err(|e| collection.handle_db_error("commit insert", e))?;
                            id
                        }
                    };
                    touched.push(id);
                }
                Write::Patch { id, patch } => {
                    let update = MongoCollection::update_document(&patch, now);
                    let matched = if update.is_empty() {
                        collection
                            .inner
                            .find_one(MongoCollection::id_filter(&id))
                            .session(&mut *session)
                            .await
                            .map_err(|e| collection.handle_db_error("commit patch", e))?
                            .is_some()
                    } else {
                        collection
                            .inner
                            .update_one(MongoCollection::id_filter(&id), update)
                            .session(&mut *session)
                            .await
                            .map_err(|e| collection.handle_db_error("commit patch", e))?
                            .matched_count
                            > 0
                    };
                    if !matched {
                        return Err(DbError::not_found(collection.name(), id));
                    }
                    touched.push(id);
                }
                Write::Remove { id } => {
                    collection
                        .inner
                        .delete_one(MongoCollection::id_filter(&id))
                        .session(&mut *session)
                        .await
                        .map_err(|e| collection.handle_db_error("commit remove", e))?;
                    touched.push(id);
                }
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            native_offset: true,
        }
    }

    async fn insert(
        &self,
        collection: &str,
        id: Option<String>,
        mut document: Document,
        stamp: Vec<String>,
    ) -> DbResult<Document> {
        let collection = self.collection(collection);
        stamp_document(&mut document, &stamp, self.server_time().await?);

        match id {
            Some(id) => {
                log::debug!("Replacing document {} in {}", id, collection.name());
                document.insert(ID_FIELD, id.clone());
                collection
                    .inner
                    .replace_one(MongoCollection::id_filter(&id), document.clone())
                    .upsert(true)
                    .await
                    .map_err(|e| collection.handle_db_error("insert", e))?;
            }
            None => {
                let id = new_id();
                document.insert(ID_FIELD, id.clone());
                collection
                    .inner
                    .insert_one(document.clone())
                    .await
                    .map_err(|e| collection.handle_db_error("insert", e))?;
                log::debug!("Inserted document {} into {}", id, collection.name());
            }
        }
        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        let collection = self.collection(collection);
        collection
            .inner
            .find_one(MongoCollection::id_filter(id))
            .await
            .map_err(|e| collection.handle_db_error("get", e))
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        patch: Patch,
    ) -> DbResult<Option<Document>> {
        let collection = self.collection(collection);
        if patch.is_empty() {
            return self.get(collection.name(), id).await;
        }
        let update = MongoCollection::update_document(&patch, self.server_time().await?);

        log::trace!("Patching {} in {} with {:?}", id, collection.name(), update);
        collection
            .inner
            .find_one_and_update(MongoCollection::id_filter(id), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| collection.handle_db_error("patch", e))
    }

    async fn remove(&self, collection: &str, id: &str) -> DbResult<bool> {
        let collection = self.collection(collection);
        let result = collection
            .inner
            .delete_one(MongoCollection::id_filter(id))
            .await
            .map_err(|e| collection.handle_db_error("remove", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn find(&self, collection: &str, query: &Query) -> DbResult<Vec<Document>> {
        let collection = self.collection(collection);
        let filter = query.filter_document();
        log::trace!("Finding in {} with filter: {:?}", collection.name(), filter);

        let mut action = collection
            .inner
            .find(filter)
            .sort(sort_document(&query.ordering()));
        if let Some(limit) = query.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            action = action.skip(offset);
        }

        let cursor = action
            .await
            .map_err(|e| collection.handle_db_error("find", e))?;
        let documents: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| collection.handle_db_error("find collect", e))?;

        log::trace!("Found {} documents in {}", documents.len(), collection.name());
        Ok(documents)
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> DbResult<u64> {
        let collection = self.collection(collection);
        collection
            .inner
            .count_documents(filters_document(filters))
            .await
            .map_err(|e| collection.handle_db_error("count", e))
    }

    async fn commit(&self, collection: &str, writes: Vec<Write>) -> DbResult<Vec<String>> {
        let collection = self.collection(collection);
        let mut session = self
            .client()
            .start_session()
            .await
            .map_err(|e| collection.handle_db_error("start session", e))?;
        session
            .start_transaction()
            .await
            .map_err(|e| collection.handle_db_error("start transaction", e))?;

        let count = writes.len();
        let now = self.server_time().await?;
        match self
            .apply_writes(&collection, &mut session, writes, now)
            .await
        {
            Ok(touched) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| collection.handle_db_error("commit transaction", e))?;
                log::debug!("Committed {} writes to {}", count, collection.name());
                Ok(touched)
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    log::warn!(
                        "Failed to abort transaction on {}: {}",
                        collection.name(),
                        abort_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn watch(&self, collection: &str) -> DbResult<ChangeStream> {
        let collection = self.collection(collection);
        let changes = collection
            .inner
            .watch()
            .await
            .map_err(|e| collection.handle_db_error("watch", e))?;

        let name = collection.name().to_string();
        let stream = changes.map(move |event| {
            event
                .map(|event| change_event(&name, event))
                .map_err(|e| DbError::database(e, Some(name.clone()), Some("watch".to_string())))
        });
        Ok(stream.boxed())
    }

    async fn ensure_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DbResult<()> {
        self.collection(collection).apply_indexing(indexes).await
    }
}
