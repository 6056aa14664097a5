use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::config;
use crate::database::manager::DatabaseError;
use crate::database::models::{
    AttendanceRecord, Event, HistoricalAttendanceRecord, School, Student, User,
};
use crate::database::store::{Collection, Document, Store};
use crate::filter::Predicate;

/// Vec-backed collection guarded by a tokio `RwLock`.
pub struct MemoryCollection<T> {
    rows: RwLock<Vec<T>>,
    list_limit: usize,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self::with_list_limit(config().api.max_list_limit)
    }

    pub fn with_list_limit(list_limit: usize) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            list_limit,
        }
    }

    fn matches(doc: &T, predicate: &Predicate) -> bool {
        predicate.matches(&|field| doc.field(field))
    }

    fn check_unique(rows: &[T], doc: &T) -> Result<(), DatabaseError> {
        let keys = doc.unique_keys();
        for existing in rows.iter().filter(|row| row.id() != doc.id()) {
            for (constraint, key) in existing.unique_keys() {
                if keys.iter().any(|(c, k)| *c == constraint && *k == key) {
                    return Err(DatabaseError::Duplicate {
                        constraint: constraint.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn push(rows: &mut Vec<T>, doc: T) -> Result<T, DatabaseError> {
        Self::check_unique(rows, &doc)?;
        rows.push(doc.clone());
        Ok(doc)
    }

    fn sorted(mut found: Vec<T>) -> Vec<T> {
        found.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        found
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> Collection<T> for MemoryCollection<T> {
    async fn find(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError> {
        let rows = self.rows.read().await;
        let found = rows
            .iter()
            .filter(|doc| Self::matches(doc, predicate))
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    async fn list(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError> {
        let mut found = self.find(predicate).await?;
        found.truncate(self.list_limit);
        Ok(found)
    }

    async fn find_one(&self, predicate: &Predicate) -> Result<Option<T>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|doc| Self::matches(doc, predicate)).cloned())
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|doc| Self::matches(doc, predicate)).count() as u64)
    }

    async fn insert(&self, doc: T) -> Result<T, DatabaseError> {
        let mut rows = self.rows.write().await;
        Self::push(&mut *rows, doc)
    }

    async fn update(&self, doc: T) -> Result<Option<T>, DatabaseError> {
        let mut rows = self.rows.write().await;
        Self::check_unique(&rows, &doc)?;
        match rows.iter_mut().find(|row| row.id() == doc.id()) {
            Some(row) => {
                *row = doc.clone();
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, predicate: &Predicate) -> Result<u64, DatabaseError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|doc| !Self::matches(doc, predicate));
        Ok((before - rows.len()) as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|doc| doc.id() == id).cloned())
    }
}

/// Process-local store. Used when no `DATABASE_URL` is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    schools: MemoryCollection<School>,
    users: MemoryCollection<User>,
    students: MemoryCollection<Student>,
    events: MemoryCollection<Event>,
    attendance: MemoryCollection<AttendanceRecord>,
    history: MemoryCollection<HistoricalAttendanceRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose client-facing lists stop at `list_limit` rows.
    pub fn with_list_limit(list_limit: usize) -> Self {
        Self {
            schools: MemoryCollection::with_list_limit(list_limit),
            users: MemoryCollection::with_list_limit(list_limit),
            students: MemoryCollection::with_list_limit(list_limit),
            events: MemoryCollection::with_list_limit(list_limit),
            attendance: MemoryCollection::with_list_limit(list_limit),
            history: MemoryCollection::with_list_limit(list_limit),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn schools(&self) -> &dyn Collection<School> {
        &self.schools
    }

    fn users(&self) -> &dyn Collection<User> {
        &self.users
    }

    fn students(&self) -> &dyn Collection<Student> {
        &self.students
    }

    fn events(&self) -> &dyn Collection<Event> {
        &self.events
    }

    fn attendance(&self) -> &dyn Collection<AttendanceRecord> {
        &self.attendance
    }

    fn history(&self) -> &dyn Collection<HistoricalAttendanceRecord> {
        &self.history
    }

    async fn record_attendance(
        &self,
        record: AttendanceRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, DatabaseError> {
        // Lock order: live, then history.
        let mut live = self.attendance.rows.write().await;
        let mut history = self.history.rows.write().await;
        let mirror = record.to_history(archived_at);
        let saved = MemoryCollection::push(&mut *live, record)?;
        history.push(mirror);
        Ok(saved)
    }

    async fn archive_attendance(
        &self,
        predicate: &Predicate,
        archived_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut live = self.attendance.rows.write().await;
        let mut history = self.history.rows.write().await;
        let (moved, kept): (Vec<_>, Vec<_>) = live
            .drain(..)
            .partition(|doc| MemoryCollection::matches(doc, predicate));
        *live = kept;
        history.extend(moved.iter().map(|record| record.to_history(archived_at)));
        Ok(moved.len() as u64)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Field;
    use crate::types::Role;
    use chrono::Duration;

    fn mark(student_id: Uuid, school_id: Uuid, event: &str, at: DateTime<Utc>) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id,
            event_name: event.to_string(),
            timestamp: at,
            scanned_by: "teacher@school.test".to_string(),
            school_id,
            student_name: Some("Ivan".to_string()),
        }
    }

    #[tokio::test]
    async fn unique_email_is_enforced() {
        let store = MemoryStore::new();
        store.users().insert(User::new("a@x.test", String::new(), Role::Teacher)).await.unwrap();
        let err = store
            .users()
            .insert(User::new("a@x.test", String::new(), Role::Parent))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { ref constraint } if constraint == "users_email_key"));
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_key() {
        let store = MemoryStore::new();
        let school = store.schools().insert(School::new("North", "Springfield")).await.unwrap();
        let mut renamed = school.clone();
        renamed.city = "Shelbyville".to_string();
        let updated = store.schools().update(renamed).await.unwrap().unwrap();
        assert_eq!(updated.city, "Shelbyville");

        let ghost = School::new("Ghost", "Nowhere");
        assert!(store.schools().update(ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_returns_newest_first() {
        let store = MemoryStore::new();
        let school = Uuid::new_v4();
        let now = Utc::now();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let at = now - Duration::minutes(10 - i as i64);
            store.attendance().insert(mark(Uuid::new_v4(), school, name, at)).await.unwrap();
        }
        let found = store.attendance().find(&Predicate::All).await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.event_name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn list_is_capped_but_find_is_not() {
        let store = MemoryStore::with_list_limit(2);
        for name in ["North", "South", "East"] {
            store.schools().insert(School::new(name, "Springfield")).await.unwrap();
        }
        let everything = Predicate::eq(Field::City, "Springfield");
        assert_eq!(store.schools().list(&everything).await.unwrap().len(), 2);
        assert_eq!(store.schools().find(&everything).await.unwrap().len(), 3);
        assert_eq!(store.schools().count(&everything).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_mark_is_case_insensitive() {
        let store = MemoryStore::new();
        let (student, school) = (Uuid::new_v4(), Uuid::new_v4());
        store.record_attendance(mark(student, school, "Физика", Utc::now()), Utc::now()).await.unwrap();
        let err = store
            .record_attendance(mark(student, school, "ФИЗИКА", Utc::now()), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate { .. }));
        // The failed write leaves no history mirror behind.
        assert_eq!(store.history().count(&Predicate::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn archive_moves_matching_marks_only() {
        let store = MemoryStore::new();
        let school = Uuid::new_v4();
        let now = Utc::now();
        store.attendance().insert(mark(Uuid::new_v4(), school, "Math", now)).await.unwrap();
        store.attendance().insert(mark(Uuid::new_v4(), school, "math", now)).await.unwrap();
        store.attendance().insert(mark(Uuid::new_v4(), school, "Art", now)).await.unwrap();

        let predicate = Predicate::eq(Field::SchoolId, school).and(Predicate::name_eq(Field::EventName, "MATH"));
        let moved = store.archive_attendance(&predicate, now).await.unwrap();
        assert_eq!(moved, 2);
        assert_eq!(store.attendance().count(&Predicate::All).await.unwrap(), 1);
        let history = store.history().find(&Predicate::All).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.archived_at == now));
    }
}
