use bson::Document;

use crate::error::DbResult;
use crate::query::{Filter, Sort};
use crate::schemas::entity::{Entity, Record};
use crate::schemas::metadata::{COMPANY_ID_FIELD, IS_DELETED_FIELD};

/// Options shared by every listing operation.
///
/// Filters are combined by conjunction. Unless `include_deleted` is set, an
/// implicit `isDeleted == false` filter is added.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filters: Vec<Filter>,
    pub sort: Vec<Sort>,
    pub limit: Option<u64>,
    /// Resume cursor: the stored form of the last record already seen.
    pub start_after: Option<Document>,
    pub include_deleted: bool,
}

impl QueryOptions {
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

    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// Resumes after a record returned by an earlier listing with the same
    /// filters and sort.
    pub fn resume_after<E: Entity>(self, record: &Record<E>) -> DbResult<Self> {
        Ok(self.start_after(record.to_document()?))
    }

    /// These options with `company_id == company_id` prepended to the filters.
    pub fn scoped_to(mut self, company_id: &str) -> DbResult<Self> {
        self.filters
            .insert(0, Filter::eq(COMPANY_ID_FIELD, company_id)?);
        Ok(self)
    }

    /// Caller filters plus the implicit soft-delete filter.
    pub fn effective_filters(&self) -> DbResult<Vec<Filter>> {
        let mut filters = self.filters.clone();
        if !self.include_deleted {
            filters.push(Filter::eq(IS_DELETED_FIELD, false)?);
        }
        Ok(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn effective_filters_hide_deleted_by_default() {
        let filters = QueryOptions::new().effective_filters().unwrap();
        assert_eq!(filters.len(), 1);
        assert!(filters[0].matches(&doc! { "isDeleted": false }));
        assert!(!filters[0].matches(&doc! { "isDeleted": true }));

        let all = QueryOptions::new()
            .include_deleted(true)
            .effective_filters()
            .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn scoped_to_prepends_company_filter() {
        let options = QueryOptions::new()
            .filter(Filter::eq("status", "Active").unwrap())
            .scoped_to("A")
            .unwrap();
        assert_eq!(options.filters.len(), 2);
        assert_eq!(
            options.filters[0].to_document(),
            bson::doc! { "company_id": { "$eq": "A" } }
        );
    }
}
