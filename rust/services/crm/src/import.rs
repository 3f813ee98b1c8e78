use bson::Document;
use crm_db::{
    repository::TenantRepository,
    schemas::{entity_from_row, Entity},
    store::DocumentStore,
    DbError,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    /// 1-based position of the row in the input
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn fail(&mut self, row: usize, err: DbError) {
        log::warn!("Import row {} failed: {}", row, err);
        self.failed += 1;
        self.failures.push(ImportFailure {
            row,
            message: err.to_string(),
        });
    }
}

/// Creates one record per row, in order, under the repository's company.
/// A failing row is reported and the import moves on to the next one.
pub async fn import_records<E, S, I>(repo: &TenantRepository<E, S>, rows: I) -> ImportReport
where
    E: Entity,
    S: DocumentStore,
    I: IntoIterator<Item = Document>,
{
    let mut report = ImportReport::default();
    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;
        let entity = match entity_from_row::<E>(row) {
            Ok(entity) => entity,
            Err(err) => {
                report.fail(row_number, err);
                continue;
            }
        };
        match repo.create(entity).await {
            Ok(_) => report.imported += 1,
            Err(err) => report.fail(row_number, err),
        }
    }
    log::info!(
        "Imported {} of {} rows into {}",
        report.imported,
        report.imported + report.failed,
        repo.repository().collection()
    );
    report
}
