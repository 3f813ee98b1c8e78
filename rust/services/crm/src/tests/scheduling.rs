use anyhow::Result;
use bson::DateTime;
use crm_mocks::fixtures::{day, mock_meeting, mock_todo, DAY_MS};

use super::{services, COMPANY};
use crate::{attendance::day_of, CrmService};
use crm_db::schemas::{
    Attendance, AttendanceStatus, Attendee, AttendeeResponse, MeetingStatus, TodoStatus,
};

fn at(days: i64, hour: i64, minute: i64) -> DateTime {
    DateTime::from_millis(days * DAY_MS + (hour * 60 + minute) * 60_000)
}

#[tokio::test]
async fn meetings_are_listed_by_range_and_upcoming() -> Result<()> {
    let (_, crm) = services();
    crm.meetings.create(mock_meeting(COMPANY, "Viewing", day(3))).await?;
    let cancelled = crm.meetings.create(mock_meeting(COMPANY, "Signing", day(4))).await?;
    crm.meetings.create(mock_meeting(COMPANY, "Kickoff", day(1))).await?;
    crm.meetings.cancel(&cancelled.id).await?;

    let week = crm.meetings.between(day(0), day(7)).await?;
    let titles: Vec<_> = week.iter().map(|r| r.data.title.as_str()).collect();
    assert_eq!(titles, vec!["Kickoff", "Viewing", "Signing"]);

    let upcoming = crm.meetings.upcoming(day(2), 10).await?;
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].data.title, "Viewing");
    assert_eq!(upcoming[0].data.status, MeetingStatus::Scheduled);
    Ok(())
}

#[tokio::test]
async fn meetings_need_a_start_before_their_end() {
    let (_, crm) = services();
    let mut no_start = mock_meeting(COMPANY, "Call", day(1));
    no_start.start_time = None;
    assert!(crm.meetings.create(no_start).await.unwrap_err().is_validation());

    let mut backwards = mock_meeting(COMPANY, "Call", day(2));
    backwards.end_time = Some(day(1));
    assert!(crm.meetings.create(backwards).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn attendees_are_appended() -> Result<()> {
    let (_, crm) = services();
    let mut meeting = mock_meeting(COMPANY, "Open house", day(5));
    meeting.organizer = Some("agent-1".to_string());
    let meeting = crm.meetings.create(meeting).await?;
    let updated = crm
        .meetings
        .add_attendee(
            &meeting.id,
            Attendee {
                name: "Mia".to_string(),
                response: AttendeeResponse::Accepted,
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.data.attendees.len(), 1);
    assert_eq!(crm.meetings.by_organizer("agent-1").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn completing_a_todo_stamps_completion_time() -> Result<()> {
    let (_, crm) = services();
    let todo = crm.todos.create(mock_todo(COMPANY, "Call bank", Some("u1"))).await?;
    crm.todos.create(mock_todo(COMPANY, "Order signs", None)).await?;

    let done = crm.todos.complete(&todo.id).await?;
    assert_eq!(done.data.status, TodoStatus::Completed);
    assert!(done.data.completed_at.is_some());
    assert_eq!(done.data.completed_at, done.meta.updated_at);

    assert_eq!(crm.todos.by_status(TodoStatus::Pending).await?.len(), 1);
    assert_eq!(crm.todos.assigned_to("u1").await?.len(), 1);
    assert!(crm.todos.create(mock_todo(COMPANY, "", None)).await.unwrap_err().is_validation());
    Ok(())
}

#[tokio::test]
async fn check_in_and_out_record_one_working_day() -> Result<()> {
    let (_, crm) = services();
    let morning = crm.attendance.check_in("emp-1", at(10, 8, 55)).await?;
    assert_eq!(morning.data.date, Some(day_of(at(10, 8, 55))));
    assert_eq!(morning.data.status, AttendanceStatus::Present);

    let late = crm.attendance.check_in("emp-2", at(10, 10, 0)).await?;
    assert_eq!(late.data.status, AttendanceStatus::Late);

    assert!(crm
        .attendance
        .check_in("emp-1", at(10, 12, 0))
        .await
        .unwrap_err()
        .is_validation());

    assert!(crm
        .attendance
        .check_out(&morning.id, at(10, 8, 0))
        .await
        .unwrap_err()
        .is_validation());
    let closed = crm.attendance.check_out(&morning.id, at(10, 17, 55)).await?;
    assert_eq!(closed.data.worked_hours(), Some(9.0));
    assert!(crm
        .attendance
        .check_out(&morning.id, at(10, 18, 0))
        .await
        .unwrap_err()
        .is_validation());

    assert_eq!(crm.attendance.by_employee("emp-1").await?.len(), 1);
    assert_eq!(crm.attendance.between(day(10), day(10)).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn absence_days_have_no_check_in() -> Result<()> {
    let (_, crm) = services();
    let absent = crm
        .attendance
        .mark("emp-3", at(11, 9, 0), AttendanceStatus::OnLeave)
        .await?;
    assert_eq!(absent.data.date, Some(day(11)));
    assert!(absent.data.check_in.is_none());
    assert!(crm
        .attendance
        .check_out(&absent.id, at(11, 17, 0))
        .await
        .unwrap_err()
        .is_validation());
    assert!(crm.attendance.check_out("missing", at(11, 17, 0)).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn attendance_index_holds_one_record_per_employee_day() -> Result<()> {
    let (store, crm) = services();
    crm.ensure_all_indexes().await?;
    let indexes = store.indexes("attendance").await;
    assert!(indexes.iter().all(|index| index.unique));

    crm.attendance.check_in("emp-4", at(12, 9, 0)).await?;
    // Writes that skip the service check still hit the index.
    let duplicate = crm
        .attendance
        .repo()
        .create(Attendance {
            employee_id: "emp-4".into(),
            date: Some(day(12)),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(duplicate.is_validation());

    let (first, second) = tokio::join!(
        crm.attendance.check_in("emp-5", at(12, 8, 30)),
        crm.attendance.check_in("emp-5", at(12, 8, 31)),
    );
    assert!(first.is_ok() != second.is_ok());
    assert_eq!(crm.attendance.by_employee("emp-5").await?.len(), 1);
    Ok(())
}
