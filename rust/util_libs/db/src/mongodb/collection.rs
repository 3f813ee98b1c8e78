use bson::{doc, Bson, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use crate::error::DbError;
use crate::query::ID_FIELD;
use crate::store::{IndexSpec, Patch};

/// Wrapper around one raw MongoDB collection.
///
/// Documents are handled untyped; the repository converts them. The wrapper
/// owns index application, translation of a [`Patch`] into update operators,
/// and consistent error mapping.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    /// The underlying MongoDB collection
    pub inner: Collection<Document>,
    name: String,
}

impl MongoCollection {
    // NB: `Database` clones share the client's connection pool.
    pub fn new(database: &Database, collection_name: &str) -> Self {
        log::trace!(
            "Opening MongoDB collection: {}.{}",
            database.name(),
            collection_name
        );
        Self {
            inner: database.collection::<Document>(collection_name),
            name: collection_name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the given indices to the collection.
    ///
    /// Index creation is idempotent on the server, so this is safe to call on
    /// every startup.
    pub async fn apply_indexing(&self, indexes: Vec<IndexSpec>) -> Result<(), DbError> {
        if indexes.is_empty() {
            log::info!("No indices to apply for collection {}", self.name);
            return Ok(());
        }

        let models: Vec<IndexModel> = indexes
            .into_iter()
            .map(|spec| {
                log::debug!(
                    "Adding index {} on {:?} (unique: {})",
                    spec.name,
                    spec.keys,
                    spec.unique
                );
                IndexModel::builder()
                    .keys(spec.keys)
                    .options(
                        IndexOptions::builder()
                            .name(spec.name)
                            .unique(spec.unique)
                            .build(),
                    )
                    .build()
            })
            .collect();
        let count = models.len();

        self.inner
            .create_indexes(models)
            .await
            .map_err(|e| self.handle_db_error("apply_indexing", e))?;

        log::info!(
            "Successfully applied {} indices to collection {}",
            count,
            self.name
        );
        Ok(())
    }

    /// Filter selecting a single document by id.
    pub fn id_filter(id: &str) -> Document {
        doc! { ID_FIELD: id }
    }

    /// Translates a patch into MongoDB update operators, resolving stamped
    /// fields to `now`. Appends to the same field are grouped with `$each`
    /// so they apply in order.
    pub fn update_document(patch: &Patch, now: DateTime) -> Document {
        let mut update = Document::new();

        let set = patch.resolved_set(now);
        if !set.is_empty() {
            update.insert("$set", set);
        }

        if !patch.unset.is_empty() {
            let unset: Document = patch
                .unset
                .iter()
                .map(|field| (field.clone(), Bson::String(String::new())))
                .collect();
            update.insert("$unset", unset);
        }

        if !patch.push.is_empty() {
            let mut grouped: Vec<(String, Vec<Bson>)> = Vec::new();
            for (field, value) in &patch.push {
                match grouped.iter_mut().find(|(f, _)| f == field) {
                    Some((_, values)) => values.push(value.clone()),
                    None => grouped.push((field.clone(), vec![value.clone()])),
                }
            }
            let push: Document = grouped
                .into_iter()
                .map(|(field, values)| (field, Bson::Document(doc! { "$each": values })))
                .collect();
            update.insert("$push", push);
        }

        update
    }

    /// Helper method to handle MongoDB errors consistently
    pub fn handle_db_error(&self, operation: &str, error: mongodb::error::Error) -> DbError {
        if is_duplicate_key(&error) {
            log::debug!("Duplicate key on {} during {}: {}", self.name, operation, error);
            return DbError::validation(format!(
                "duplicate key in {} ({}): {}",
                self.name, operation, error
            ));
        }
        log::error!(
            "MongoDB {} operation on {} failed: {}",
            operation,
            self.name,
            error
        );
        DbError::database(error, Some(self.name.clone()), Some(operation.to_string()))
    }
}

const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(failure) => failure.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
