use bson::{doc, DateTime};
use chrono::NaiveTime;
use crm_db::{
    query::Filter,
    repository::{QueryOptions, Repository, TenantRepository},
    schemas::{Attendance, AttendanceStatus, Record},
    store::DocumentStore,
    DbError, DbResult,
};

use crate::common::{list_between, list_by, require, CrmService};

/// Check-ins after this time of day (UTC) are recorded as late.
pub const DEFAULT_LATE_AFTER: (u32, u32) = (9, 15);

#[derive(Debug, Clone)]
pub struct AttendanceService<S> {
    repo: TenantRepository<Attendance, S>,
    late_after: NaiveTime,
}

impl<S: DocumentStore> CrmService<Attendance, S> for AttendanceService<S> {
    fn repo(&self) -> &TenantRepository<Attendance, S> {
        &self.repo
    }
}

/// Midnight UTC of the day containing `at`.
pub fn day_of(at: DateTime) -> DateTime {
    let midnight = at.to_chrono().date_naive().and_time(NaiveTime::MIN);
    DateTime::from_chrono(midnight.and_utc())
}

impl<S: DocumentStore> AttendanceService<S> {
    pub fn new(store: S, company_id: impl Into<String>) -> Self {
        let (hour, minute) = DEFAULT_LATE_AFTER;
        Self {
            repo: Repository::new(store).for_company(company_id),
            late_after: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn with_late_after(mut self, late_after: NaiveTime) -> Self {
        self.late_after = late_after;
        self
    }

    pub async fn by_employee(&self, employee_id: &str) -> DbResult<Vec<Record<Attendance>>> {
        list_by(&self.repo, "employeeId", employee_id).await
    }

    /// Attendance days within `[start, end]`, oldest first.
    pub async fn between(
        &self,
        start: DateTime,
        end: DateTime,
    ) -> DbResult<Vec<Record<Attendance>>> {
        list_between(&self.repo, "date", start, end).await
    }

    async fn for_day(&self, employee_id: &str, day: DateTime) -> DbResult<Option<Record<Attendance>>> {
        let options = QueryOptions::new()
            .filter(Filter::eq("employeeId", employee_id)?)
            .filter(Filter::eq("date", day)?)
            .limit(1);
        Ok(self.repo.get_all(&options).await?.into_iter().next())
    }

    /// Opens the employee's attendance for the day of `at`. One check-in per
    /// employee and day.
    pub async fn check_in(&self, employee_id: &str, at: DateTime) -> DbResult<Record<Attendance>> {
        require("employeeId", employee_id)?;
        let day = day_of(at);
        if self.for_day(employee_id, day).await?.is_some() {
            return Err(DbError::validation(format!(
                "employee {} already checked in on {}",
                employee_id,
                at.to_chrono().date_naive()
            )));
        }

        let status = if at.to_chrono().time() > self.late_after {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };
        log::debug!("Check-in for {} at {} ({})", employee_id, at, status);
        self.repo
            .create(Attendance {
                employee_id: employee_id.to_string(),
                date: Some(day),
                check_in: Some(at),
                status,
                ..Default::default()
            })
            .await
    }

    /// Closes an open attendance record.
    pub async fn check_out(&self, id: &str, at: DateTime) -> DbResult<Record<Attendance>> {
        let current = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(self.repo.repository().collection(), id))?;
        let check_in = current
            .data
            .check_in
            .ok_or_else(|| DbError::validation(format!("attendance {} has no check-in", id)))?;
        if current.data.check_out.is_some() {
            return Err(DbError::validation(format!(
                "attendance {} is already checked out",
                id
            )));
        }
        if at < check_in {
            return Err(DbError::validation("check-out is before check-in"));
        }
        self.repo.update(id, doc! { "checkOut": at }).await
    }

    /// Records an absence or leave day without check-in times.
    pub async fn mark(
        &self,
        employee_id: &str,
        day: DateTime,
        status: AttendanceStatus,
    ) -> DbResult<Record<Attendance>> {
        require("employeeId", employee_id)?;
        let day = day_of(day);
        if self.for_day(employee_id, day).await?.is_some() {
            return Err(DbError::validation(format!(
                "employee {} already has attendance on that day",
                employee_id
            )));
        }
        self.repo
            .create(Attendance {
                employee_id: employee_id.to_string(),
                date: Some(day),
                status,
                ..Default::default()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_of_truncates_to_midnight_utc() {
        let at = DateTime::parse_rfc3339_str("2024-05-06T17:45:12Z").unwrap();
        let day = day_of(at);
        assert_eq!(
            day,
            DateTime::parse_rfc3339_str("2024-05-06T00:00:00Z").unwrap()
        );
    }
}
