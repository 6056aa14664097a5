use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use std::marker::PhantomData;
use tracing::debug;

use crate::config::config;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    AttendanceRecord, Event, HistoricalAttendanceRecord, School, Student, User,
};
use crate::database::query_builder::{
    bind_param_query, bind_param_query_as, fetch_all, fetch_count, fetch_optional, QueryBuilder,
};
use crate::database::store::{Collection, Document, Store};
use crate::filter::{Predicate, SqlWhere};

fn log_query(table: &str, query: &str) {
    if config().database.enable_query_logging {
        debug!(table, query, "sql");
    }
}

pub struct PgCollection<T> {
    pool: PgPool,
    _phantom: PhantomData<T>,
}

impl<T> PgCollection<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Collection<T> for PgCollection<T>
where
    T: Document + for<'r> FromRow<'r, PgRow>,
{
    async fn find(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError> {
        let sql = QueryBuilder::<T>::new().select_sql(predicate);
        log_query(T::TABLE, &sql.query);
        fetch_all(&self.pool, &sql).await
    }

    async fn list(&self, predicate: &Predicate) -> Result<Vec<T>, DatabaseError> {
        let sql = QueryBuilder::<T>::new()
            .limit(config().api.max_list_limit)
            .select_sql(predicate);
        log_query(T::TABLE, &sql.query);
        fetch_all(&self.pool, &sql).await
    }

    async fn find_one(&self, predicate: &Predicate) -> Result<Option<T>, DatabaseError> {
        let sql = QueryBuilder::<T>::new().limit(1).select_sql(predicate);
        fetch_optional(&self.pool, &sql).await
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, DatabaseError> {
        let sql = QueryBuilder::<T>::new().count_sql(predicate);
        fetch_count(&self.pool, &sql).await
    }

    async fn insert(&self, doc: T) -> Result<T, DatabaseError> {
        let sql = QueryBuilder::<T>::new().insert_sql(&doc);
        fetch_optional(&self.pool, &sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", T::TABLE)))
    }

    async fn update(&self, doc: T) -> Result<Option<T>, DatabaseError> {
        let sql = QueryBuilder::<T>::new().update_sql(&doc);
        fetch_optional(&self.pool, &sql).await
    }

    async fn delete(&self, predicate: &Predicate) -> Result<u64, DatabaseError> {
        let sql = QueryBuilder::<T>::new().delete_sql(predicate);
        log_query(T::TABLE, &sql.query);
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        Ok(q.execute(&self.pool).await?.rows_affected())
    }
}

/// PostgreSQL-backed store. Compound ledger writes run in one transaction.
pub struct PgStore {
    pool: PgPool,
    schools: PgCollection<School>,
    users: PgCollection<User>,
    students: PgCollection<Student>,
    events: PgCollection<Event>,
    attendance: PgCollection<AttendanceRecord>,
    history: PgCollection<HistoricalAttendanceRecord>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            schools: PgCollection::new(pool.clone()),
            users: PgCollection::new(pool.clone()),
            students: PgCollection::new(pool.clone()),
            events: PgCollection::new(pool.clone()),
            attendance: PgCollection::new(pool.clone()),
            history: PgCollection::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn archive_sql(predicate: &Predicate, archived_at: DateTime<Utc>) -> (String, String, Vec<Value>) {
    let clause = SqlWhere::generate(predicate, 0);
    let stamp_index = clause.params.len() + 1;
    let insert = format!(
        "INSERT INTO \"{history}\" (\"id\", \"student_id\", \"event_name\", \"event_key\", \"timestamp\", \"scanned_by\", \"school_id\", \"student_name\", \"archived_at\") \
         SELECT gen_random_uuid(), \"student_id\", \"event_name\", \"event_key\", \"timestamp\", \"scanned_by\", \"school_id\", \"student_name\", ${stamp_index}::timestamptz \
         FROM \"{live}\" WHERE {clause}",
        history = HistoricalAttendanceRecord::TABLE,
        live = AttendanceRecord::TABLE,
        clause = clause.query,
    );
    let delete = format!("DELETE FROM \"{}\" WHERE {}", AttendanceRecord::TABLE, clause.query);
    let mut params = clause.params;
    params.push(Value::String(archived_at.to_rfc3339()));
    (insert, delete, params)
}

#[async_trait]
impl Store for PgStore {
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
        let live_sql = QueryBuilder::<AttendanceRecord>::new().insert_sql(&record);
        let mirror_sql = QueryBuilder::<HistoricalAttendanceRecord>::new().insert_sql(&record.to_history(archived_at));

        let mut tx = self.pool.begin().await?;

        let mut q = sqlx::query_as::<_, AttendanceRecord>(&live_sql.query);
        for p in live_sql.params.iter() {
            q = bind_param_query_as(q, p);
        }
        let saved = q.fetch_one(&mut *tx).await?;

        let mut q = sqlx::query(&mirror_sql.query);
        for p in mirror_sql.params.iter() {
            q = bind_param_query(q, p);
        }
        q.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn archive_attendance(
        &self,
        predicate: &Predicate,
        archived_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let (insert, delete, params) = archive_sql(predicate, archived_at);
        let where_params = params.len() - 1;

        let mut tx = self.pool.begin().await?;

        let mut q = sqlx::query(&insert);
        for p in params.iter() {
            q = bind_param_query(q, p);
        }
        q.execute(&mut *tx).await?;

        let mut q = sqlx::query(&delete);
        for p in params.iter().take(where_params) {
            q = bind_param_query(q, p);
        }
        let moved = q.execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;
        Ok(moved)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Field;
    use uuid::Uuid;

    #[test]
    fn archive_copies_then_deletes_with_shared_clause() {
        let school = Uuid::new_v4();
        let predicate = Predicate::eq(Field::SchoolId, school).and(Predicate::name_eq(Field::EventName, "Math"));
        let (insert, delete, params) = archive_sql(&predicate, Utc::now());
        assert!(insert.starts_with("INSERT INTO \"historical_attendance\""));
        assert!(insert.contains("$3::timestamptz FROM \"attendance\" WHERE (\"school_id\" = $1::uuid) AND (\"event_key\" = $2)"));
        assert_eq!(delete, "DELETE FROM \"attendance\" WHERE (\"school_id\" = $1::uuid) AND (\"event_key\" = $2)");
        assert_eq!(params.len(), 3);
    }
}
