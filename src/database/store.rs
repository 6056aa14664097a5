use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AttendanceRecord, Event, HistoricalAttendanceRecord, School, Student, User,
};
use crate::filter::{Field, Predicate};

/// A persisted entity as seen by the store.
pub trait Document: Clone + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Lists come back newest first by this column.
    const SORT: Field;

    fn id(&self) -> Uuid;

    fn sort_key(&self) -> DateTime<Utc>;

    /// Column values, including derived collation keys.
    fn columns(&self) -> Vec<(Field, Value)>;

    /// `(constraint, key)` pairs; two documents with the same pair collide.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![]
    }

    fn field(&self, field: Field) -> Value {
        self.columns()
            .into_iter()
            .find(|(column, _)| *column == field)
            .map(|(_, value)| value)
            .unwrap_or(Value::Null)
    }
}

/// Filtered access to one entity set.
#[async_trait]
pub trait Collection<T: Document>: Send + Sync {
    /// Every matching document, newest first.
    async fn find(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError>;

    /// Like [`Collection::find`], capped at `api.max_list_limit`. For rows
    /// returned to clients; never for scope or membership lookups.
    async fn list(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError>;

    async fn find_one(&self, predicate: &Predicate) -> Result<Option<T>, DatabaseError>;

    async fn count(&self, predicate: &Predicate) -> Result<u64, DatabaseError>;

    /// Fails with [`DatabaseError::Duplicate`] on a unique-constraint clash.
    async fn insert(&self, doc: T) -> Result<T, DatabaseError>;

    /// Replaces the document with the same id. `None` if it no longer exists.
    async fn update(&self, doc: T) -> Result<Option<T>, DatabaseError>;

    /// Returns the number of removed documents.
    async fn delete(&self, predicate: &Predicate) -> Result<u64, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        self.find_one(&Predicate::eq(Field::Id, id)).await
    }
}

/// The persistent store: one collection per entity plus the two compound
/// ledger writes, which implementations run atomically where they can.
#[async_trait]
pub trait Store: Send + Sync {
    fn schools(&self) -> &dyn Collection<School>;
    fn users(&self) -> &dyn Collection<User>;
    fn students(&self) -> &dyn Collection<Student>;
    fn events(&self) -> &dyn Collection<Event>;
    fn attendance(&self) -> &dyn Collection<AttendanceRecord>;
    fn history(&self) -> &dyn Collection<HistoricalAttendanceRecord>;

    /// Insert a live mark and its historical mirror.
    async fn record_attendance(
        &self,
        record: AttendanceRecord,
        archived_at: DateTime<Utc>,
    ) -> Result<AttendanceRecord, DatabaseError>;

    /// Copy every live mark matching `predicate` into history, then delete
    /// them from the live ledger. Returns how many were moved.
    async fn archive_attendance(
        &self,
        predicate: &Predicate,
        archived_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    fn backend(&self) -> &'static str;
}
