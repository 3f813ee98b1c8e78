use bson::{doc, Bson, DateTime};
use crm_db::{
    query::{Filter, Sort},
    repository::{QueryOptions, TenantRepository},
    schemas::{Entity, Record},
    store::DocumentStore,
    DbError, DbResult,
};
use std::{fmt::Display, str::FromStr};

/// Access to the tenant repository behind an entity service.
pub trait CrmService<E: Entity, S: DocumentStore> {
    fn repo(&self) -> &TenantRepository<E, S>;
}

/// Parses a status string into its enum, rejecting unknown values.
pub fn parse_status<T: FromStr>(kind: &str, value: &str) -> DbResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DbError::validation(format!("unknown {} status '{}'", kind, value)))
}

pub fn require(field: &str, value: &str) -> DbResult<()> {
    if value.trim().is_empty() {
        return Err(DbError::validation(format!(
            "missing required field '{}'",
            field
        )));
    }
    Ok(())
}

/// Lists the tenant's records matching one filter.
pub async fn list_where<E: Entity, S: DocumentStore>(
    repo: &TenantRepository<E, S>,
    filter: Filter,
    sort: Option<Sort>,
) -> DbResult<Vec<Record<E>>> {
    let mut options = QueryOptions::new().filter(filter);
    if let Some(sort) = sort {
        options = options.sort(sort);
    }
    repo.get_all(&options).await
}

/// Lists the tenant's records whose `field` equals `value`.
pub async fn list_by<E: Entity, S: DocumentStore>(
    repo: &TenantRepository<E, S>,
    field: &str,
    value: impl Into<Bson>,
) -> DbResult<Vec<Record<E>>> {
    list_where(repo, Filter::eq(field, value)?, None).await
}

/// Lists records whose date `field` lies in `[start, end]`, oldest first.
pub async fn list_between<E: Entity, S: DocumentStore>(
    repo: &TenantRepository<E, S>,
    field: &str,
    start: DateTime,
    end: DateTime,
) -> DbResult<Vec<Record<E>>> {
    if end < start {
        return Err(DbError::validation(format!(
            "invalid range on '{}': end is before start",
            field
        )));
    }
    list_where(
        repo,
        Filter::between(field, start, end)?,
        Some(Sort::asc(field)),
    )
    .await
}

/// Validates `value` against the status enum `T` and writes its canonical
/// form to `field`.
pub async fn set_status<T, E, S>(
    repo: &TenantRepository<E, S>,
    id: &str,
    field: &str,
    kind: &str,
    value: &str,
) -> DbResult<Record<E>>
where
    T: FromStr + Display,
    E: Entity,
    S: DocumentStore,
{
    let status: T = parse_status(kind, value)?;
    let mut update = doc! {};
    update.insert(field, status.to_string());
    let record = repo.update(id, update).await?;
    log::info!(
        "Set {} status of {}/{} to {}",
        kind,
        repo.repository().collection(),
        id,
        status
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_db::schemas::InvoiceStatus;

    #[test]
    fn parse_status_accepts_known_variants_only() {
        let status: InvoiceStatus = parse_status("invoice", "Paid").unwrap();
        assert_eq!(status, InvoiceStatus::Paid);

        let err = parse_status::<InvoiceStatus>("invoice", "Refunded").unwrap_err();
        assert!(err.is_validation());
        assert!(err.message().contains("Refunded"));
    }

    #[test]
    fn require_rejects_blank_values() {
        assert!(require("title", "Flat").is_ok());
        assert!(require("title", "  ").unwrap_err().is_validation());
    }
}
