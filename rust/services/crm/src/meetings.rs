use bson::DateTime;
use crm_db::{
    query::{Filter, Sort},
    repository::{QueryOptions, Repository, TenantRepository},
    schemas::{Attendee, Meeting, MeetingStatus, Record},
    store::{DocumentStore, Patch},
    DbError, DbResult,
};

use crate::common::{list_between, list_by, require, set_status, CrmService};

#[derive(Debug, Clone)]
pub struct MeetingService<S> {
    repo: TenantRepository<Meeting, S>,
}

impl<S: DocumentStore> CrmService<Meeting, S> for MeetingService<S> {
    fn repo(&self) -> &TenantRepository<Meeting, S> {
        &self.repo
    }
}

impl<S: DocumentStore> MeetingService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        Self {
            repo: Repository::new(store).for_company(company_id),
        }
    }

    pub async fn create(&self, meeting: Meeting) -> DbResult<Record<Meeting>> {
        require("title", &meeting.title)?;
        let start = meeting
            .start_time
            .ok_or_else(|| DbError::validation("missing required field 'startTime'"))?;
        if matches!(meeting.end_time, Some(end) if end < start) {
            return Err(DbError::validation("meeting ends before it starts"));
        }
        self.repo.create(meeting).await
    }

    /// Meetings starting within `[start, end]`, earliest first.
    pub async fn between(&self, start: DateTime, end: DateTime) -> DbResult<Vec<Record<Meeting>>> {
        list_between(&self.repo, "startTime", start, end).await
    }

    pub async fn by_organizer(&self, organizer: &str) -> DbResult<Vec<Record<Meeting>>> {
        list_by(&self.repo, "organizer", organizer).await
    }

    /// The next `limit` scheduled meetings starting at or after `now`.
    pub async fn upcoming(&self, now: DateTime, limit: u64) -> DbResult<Vec<Record<Meeting>>> {
        let options = QueryOptions::new()
            .filter(Filter::eq("status", MeetingStatus::Scheduled.to_string())?)
            .filter(Filter::gte("startTime", now)?)
            .sort(Sort::asc("startTime"))
            .limit(limit);
        self.repo.get_all(&options).await
    }

    /// Appends an attendee atomically.
    pub async fn add_attendee(&self, id: &str, attendee: Attendee) -> DbResult<Record<Meeting>> {
        require("name", &attendee.name)?;
        let attendee = bson::to_bson(&attendee)?;
        self.repo
            .apply(id, Patch::new().push("attendees", attendee))
            .await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> DbResult<Record<Meeting>> {
        set_status::<MeetingStatus, _, _>(&self.repo, id, "status", "meeting", status).await
    }

    pub async fn cancel(&self, id: &str) -> DbResult<Record<Meeting>> {
        self.update_status(id, &MeetingStatus::Cancelled.to_string())
            .await
    }
}
