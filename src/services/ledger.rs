//! Attendance ledger: live marks, their historical mirror, and reads over both.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::naming::collation_key;
use super::tenancy::Scope;
use super::visibility::{authorize_event, authorize_student_view, ListRequest};
use super::{Caller, ServiceError, ServiceResult};
use crate::config::config;
use crate::database::models::{AttendanceRecord, Event, HistoricalAttendanceRecord, Student};
use crate::database::{DatabaseError, Store};
use crate::filter::{Field, Predicate};

#[derive(Debug, Clone, Deserialize)]
pub struct RecordAttendance {
    pub student_id: Uuid,
    pub event_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub scanned_by: Option<String>,
    /// Disambiguates an event name used by several schools in scope.
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    History,
}

/// A row of a merged live/historical listing.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceEntry {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(rename = "studentName")]
    pub student_name: String,
    pub group: String,
    pub specialty: String,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
    pub scanned_by: String,
    pub school_id: Uuid,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    Month,
    Year,
}

impl Period {
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
        };
        now - Duration::days(days)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceQuery {
    pub school_id: Option<Uuid>,
    pub city: Option<String>,
    pub period: Option<Period>,
}

/// Finds the event a human-entered name refers to, inside the caller's
/// scope, and authorizes the caller against it.
pub async fn resolve_event(
    store: &dyn Store,
    caller: &Caller,
    scope: &Scope,
    name: &str,
    school_id: Option<Uuid>,
) -> ServiceResult<Event> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("Event name is required"));
    }
    let predicate = Predicate::name_eq(Field::Name, name).and(scope.narrow(school_id)?);
    let mut events = store.events().find(&predicate).await?;
    let event = match events.len() {
        0 => return Err(ServiceError::not_found("Event not found")),
        1 => events.remove(0),
        _ => {
            return Err(ServiceError::validation(
                "Event name is used by several schools; pass school_id",
            ))
        }
    };
    authorize_event(caller, scope, &event)?;
    Ok(event)
}

/// Live marks of `event` at its school, matched by collation key.
pub(crate) fn live_marks_of(event: &Event) -> Predicate {
    Predicate::eq(Field::SchoolId, event.school_id).and(Predicate::name_eq(Field::EventName, &event.name))
}

pub async fn record(store: &dyn Store, caller: &Caller, request: RecordAttendance) -> ServiceResult<AttendanceRecord> {
    caller.require_staff()?;
    let scope = Scope::resolve(store, caller).await?;
    let event = resolve_event(store, caller, &scope, &request.event_name, request.school_id).await?;

    let student = store
        .students()
        .find_by_id(request.student_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))?;
    scope.authorize(student.school_id)?;
    if student.school_id != event.school_id {
        return Err(ServiceError::validation("Student does not belong to the event's school"));
    }

    let existing = live_marks_of(&event).and(Predicate::eq(Field::StudentId, student.id));
    if store.attendance().find_one(&existing).await?.is_some() {
        return Err(ServiceError::Conflict("Attendance already recorded".to_string()));
    }

    let scanned_by = match request.scanned_by.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        Some(scanned_by) => scanned_by,
        None => scanner_of(store, caller).await?,
    };
    let now = Utc::now();
    let mark = AttendanceRecord {
        id: Uuid::new_v4(),
        student_id: student.id,
        event_name: event.name.clone(),
        timestamp: request.timestamp.unwrap_or(now),
        scanned_by,
        school_id: event.school_id,
        student_name: Some(student.name.clone()),
    };

    // The unique index is authoritative; the check above is advisory.
    let saved = store.record_attendance(mark, now).await.map_err(|err| match err {
        DatabaseError::Duplicate { .. } => ServiceError::Conflict("Attendance already recorded".to_string()),
        other => {
            error!(student = %student.id, event = %event.id, "live insert or history mirror failed: {}", other);
            ServiceError::Database(other)
        }
    })?;
    info!(student = %student.id, event = %event.name, school = %event.school_id, "attendance recorded");
    Ok(saved)
}

async fn scanner_of(store: &dyn Store, caller: &Caller) -> ServiceResult<String> {
    Ok(store
        .users()
        .find_by_id(caller.user_id)
        .await?
        .map(|user| user.email)
        .unwrap_or_else(|| caller.user_id.to_string()))
}

pub async fn check(
    store: &dyn Store,
    caller: &Caller,
    student_id: Uuid,
    event_name: &str,
    school_id: Option<Uuid>,
) -> ServiceResult<bool> {
    caller.require_staff()?;
    let scope = Scope::resolve(store, caller).await?;
    let event = resolve_event(store, caller, &scope, event_name, school_id).await?;
    let predicate = live_marks_of(&event).and(Predicate::eq(Field::StudentId, student_id));
    Ok(store.attendance().find_one(&predicate).await?.is_some())
}

/// Removes one live mark. History keeps it.
pub async fn delete(store: &dyn Store, caller: &Caller, record_id: Uuid) -> ServiceResult<()> {
    caller.require_staff()?;
    let record = store
        .attendance()
        .find_by_id(record_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Attendance record not found"))?;
    Scope::resolve(store, caller).await?.authorize(record.school_id)?;
    store.attendance().delete(&Predicate::eq(Field::Id, record.id)).await?;
    info!(record = %record.id, "attendance mark deleted");
    Ok(())
}

/// Removes every live mark of one event. History keeps them.
pub async fn delete_all_for_event(
    store: &dyn Store,
    caller: &Caller,
    event_name: &str,
    school_id: Option<Uuid>,
) -> ServiceResult<u64> {
    caller.require_staff()?;
    let scope = Scope::resolve(store, caller).await?;
    let event = resolve_event(store, caller, &scope, event_name, school_id).await?;
    let removed = store.attendance().delete(&live_marks_of(&event)).await?;
    info!(event = %event.name, school = %event.school_id, removed, "live marks cleared");
    Ok(removed)
}

/// Live marks of one event, newest first.
pub async fn by_event(
    store: &dyn Store,
    caller: &Caller,
    event_name: &str,
    school_id: Option<Uuid>,
) -> ServiceResult<Vec<AttendanceRecord>> {
    caller.require_staff()?;
    let scope = Scope::resolve(store, caller).await?;
    let event = resolve_event(store, caller, &scope, event_name, school_id).await?;
    Ok(store.attendance().list(&live_marks_of(&event)).await?)
}

/// Live and historical marks of one student.
pub async fn by_student(store: &dyn Store, caller: &Caller, student_id: Uuid) -> ServiceResult<Vec<AttendanceEntry>> {
    let student = store
        .students()
        .find_by_id(student_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_student_view(store, caller, &scope, &student).await?;

    let predicate = Predicate::eq(Field::StudentId, student.id);
    merged(store, &predicate).await
}

/// Scoped listing over both ledgers.
pub async fn list(store: &dyn Store, caller: &Caller, query: AttendanceQuery) -> ServiceResult<Vec<AttendanceEntry>> {
    let scope = Scope::resolve(store, caller).await?;
    let request = ListRequest::Attendance {
        school_id: query.school_id,
        city: query.city,
        since: query.period.map(|p| p.since(Utc::now())),
    };
    let predicate = request.filter(store, caller, &scope).await?;
    merged(store, &predicate).await
}

/// Live rows plus the history rows that are not a copy of a row already
/// listed, newest first, joined with the student's current profile.
async fn merged(store: &dyn Store, predicate: &Predicate) -> ServiceResult<Vec<AttendanceEntry>> {
    let live = store.attendance().find(predicate).await?;
    let history = store.history().find(predicate).await?;

    let student_ids: HashSet<Uuid> = live
        .iter()
        .map(|r| r.student_id)
        .chain(history.iter().map(|r| r.student_id))
        .collect();
    let students: HashMap<Uuid, Student> = store
        .students()
        .find(&Predicate::is_in(Field::Id, student_ids))
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    // A scan is identified by who, what, where and when. The history mirror
    // and the archive copy repeat all four.
    let mut seen: HashSet<(Uuid, String, Uuid, DateTime<Utc>)> = HashSet::new();
    let mut entries = Vec::with_capacity(live.len() + history.len());
    for r in live {
        seen.insert((r.student_id, collation_key(&r.event_name), r.school_id, r.timestamp));
        entries.push(AttendanceEntry::live(r, &students));
    }
    for h in history {
        if seen.insert((h.student_id, collation_key(&h.event_name), h.school_id, h.timestamp)) {
            entries.push(AttendanceEntry::archived(h, &students));
        }
    }

    let orphaned = entries.iter().filter(|e| !students.contains_key(&e.student_id)).count();
    if orphaned > 0 {
        warn!(orphaned, "attendance rows reference deleted students");
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries.truncate(config().api.max_list_limit);
    Ok(entries)
}

impl AttendanceEntry {
    fn live(r: AttendanceRecord, students: &HashMap<Uuid, Student>) -> Self {
        let (student_name, group, specialty) = profile(students, r.student_id, r.student_name);
        Self {
            id: r.id,
            student_id: r.student_id,
            student_name,
            group,
            specialty,
            event_name: r.event_name,
            timestamp: r.timestamp,
            scanned_by: r.scanned_by,
            school_id: r.school_id,
            source: Source::Live,
            archived_at: None,
        }
    }

    fn archived(h: HistoricalAttendanceRecord, students: &HashMap<Uuid, Student>) -> Self {
        let (student_name, group, specialty) = profile(students, h.student_id, h.student_name);
        Self {
            id: h.id,
            student_id: h.student_id,
            student_name,
            group,
            specialty,
            event_name: h.event_name,
            timestamp: h.timestamp,
            scanned_by: h.scanned_by,
            school_id: h.school_id,
            source: Source::History,
            archived_at: Some(h.archived_at),
        }
    }
}

/// Current name, group and specialty; the scan-time name if the student is gone.
fn profile(students: &HashMap<Uuid, Student>, student_id: Uuid, snapshot: Option<String>) -> (String, String, String) {
    match students.get(&student_id) {
        Some(s) => (s.name.clone(), s.group.clone(), s.specialty.clone()),
        None => (snapshot.unwrap_or_else(|| "Unknown".to_string()), String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn scan(fx: &Fixture, name: &str) -> RecordAttendance {
        RecordAttendance {
            student_id: fx.alice.id,
            event_name: name.to_string(),
            timestamp: None,
            scanned_by: None,
            school_id: None,
        }
    }

    #[tokio::test]
    async fn second_scan_conflicts_and_writes_nothing() {
        let fx = Fixture::seeded().await;
        let first = record(fx.store(), &fx.teacher(), scan(&fx, "урок истории")).await.unwrap();
        assert_eq!(first.event_name, "Урок Истории");
        assert_eq!(first.student_name.as_deref(), Some("Alice"));
        assert_eq!(first.scanned_by, "teacher@north.test");

        let second = record(fx.store(), &fx.teacher(), scan(&fx, "УРОК ИСТОРИИ")).await;
        assert!(matches!(second, Err(ServiceError::Conflict(_))));
        assert_eq!(fx.store().attendance().count(&Predicate::All).await.unwrap(), 1);
        assert_eq!(fx.store().history().count(&Predicate::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_event_and_student_are_not_found() {
        let fx = Fixture::seeded().await;
        let missing_event = record(fx.store(), &fx.teacher(), scan(&fx, "Chemistry")).await;
        assert!(matches!(missing_event, Err(ServiceError::NotFound(_))));

        let mut request = scan(&fx, "Урок Истории");
        request.student_id = Uuid::new_v4();
        assert!(matches!(
            record(fx.store(), &fx.teacher(), request).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn events_outside_scope_are_invisible() {
        let fx = Fixture::seeded().await;
        // The Metro teacher's scope has no such event.
        let result = record(fx.store(), &fx.metro_teacher(), scan(&fx, "Урок Истории")).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn students_from_other_schools_are_rejected() {
        let fx = Fixture::seeded().await;
        let mut request = scan(&fx, "Урок Истории");
        request.student_id = fx.carol.id;
        assert!(matches!(
            record(fx.store(), &fx.teacher(), request).await,
            Err(ServiceError::AccessDenied(_))
        ));
        let mut request = scan(&fx, "Урок Истории");
        request.student_id = fx.bob.id;
        assert!(matches!(
            record(fx.store(), &fx.district_admin(), request).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn check_and_delete_leave_history_alone() {
        let fx = Fixture::seeded().await;
        let caller = fx.school_admin();
        assert!(!check(fx.store(), &caller, fx.alice.id, "урок истории", None).await.unwrap());
        let mark = record(fx.store(), &caller, scan(&fx, "Урок Истории")).await.unwrap();
        assert!(check(fx.store(), &caller, fx.alice.id, "урок истории", None).await.unwrap());

        assert!(matches!(
            delete(fx.store(), &fx.metro_teacher(), mark.id).await,
            Err(ServiceError::AccessDenied(_))
        ));
        delete(fx.store(), &caller, mark.id).await.unwrap();
        assert!(!check(fx.store(), &caller, fx.alice.id, "Урок Истории", None).await.unwrap());
        assert_eq!(fx.store().history().count(&Predicate::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_all_clears_live_marks_of_one_event() {
        let fx = Fixture::seeded().await;
        let caller = fx.school_admin();
        let other = fx.add_event(&fx.north, &fx.teacher, "Art", true).await;
        record(fx.store(), &caller, scan(&fx, "Урок Истории")).await.unwrap();
        record(fx.store(), &caller, scan(&fx, &other.name)).await.unwrap();

        let removed = delete_all_for_event(fx.store(), &caller, "урок истории", None).await.unwrap();
        assert_eq!(removed, 1);
        let left = fx.store().attendance().find(&Predicate::All).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].event_name, "Art");
        assert_eq!(fx.store().history().count(&Predicate::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn listing_shows_each_scan_once() {
        let fx = Fixture::seeded().await;
        let caller = fx.school_admin();
        record(fx.store(), &caller, scan(&fx, "Урок Истории")).await.unwrap();
        let entries = list(fx.store(), &caller, AttendanceQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, Source::Live);
        assert_eq!(entries[0].group, "10A");

        fx.store()
            .archive_attendance(&live_marks_of(&fx.lesson), Utc::now())
            .await
            .unwrap();
        let entries = list(fx.store(), &caller, AttendanceQuery::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, Source::History);
        assert!(entries[0].archived_at.is_some());
    }

    #[tokio::test]
    async fn listing_is_staff_only_and_scoped() {
        let fx = Fixture::seeded().await;
        record(fx.store(), &fx.school_admin(), scan(&fx, "Урок Истории")).await.unwrap();
        assert!(list(fx.store(), &fx.parent(), AttendanceQuery::default()).await.is_err());
        let metro = list(fx.store(), &fx.metro_teacher(), AttendanceQuery::default()).await.unwrap();
        assert!(metro.is_empty());
        let district = list(fx.store(), &fx.district_admin(), AttendanceQuery::default()).await.unwrap();
        assert_eq!(district.len(), 1);
    }

    #[tokio::test]
    async fn parents_read_only_their_childrens_attendance() {
        let fx = Fixture::seeded().await;
        record(fx.store(), &fx.school_admin(), scan(&fx, "Урок Истории")).await.unwrap();
        assert_eq!(by_student(fx.store(), &fx.parent(), fx.alice.id).await.unwrap().len(), 1);
        assert!(matches!(
            by_student(fx.store(), &fx.parent(), fx.bob.id).await,
            Err(ServiceError::AccessDenied(_))
        ));
    }

    #[test]
    fn periods_reach_back() {
        let now = Utc::now();
        assert_eq!(Period::Week.since(now), now - Duration::days(7));
        assert_eq!(Period::Year.since(now), now - Duration::days(365));
    }
}
