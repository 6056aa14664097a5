use serde_json::Value;
use sqlx::{self, postgres::PgArguments, FromRow, PgPool, Row};
use std::marker::PhantomData;

use crate::database::manager::DatabaseError;
use crate::database::store::Document;
use crate::filter::sql::quote;
use crate::filter::{Field, Predicate, SqlResult, SqlWhere};

/// SQL generation for one [`Document`] table.
pub struct QueryBuilder<T> {
    limit: Option<usize>,
    _phantom: PhantomData<T>,
}

impl<T: Document> QueryBuilder<T> {
    pub fn new() -> Self {
        Self {
            limit: None,
            _phantom: PhantomData,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select_sql(&self, predicate: &Predicate) -> SqlResult {
        let clause = SqlWhere::generate(predicate, 0);
        let mut query = format!(
            "SELECT * FROM \"{}\" WHERE {} ORDER BY {} DESC",
            T::TABLE,
            clause.query,
            quote(T::SORT)
        );
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        SqlResult { query, params: clause.params }
    }

    pub fn count_sql(&self, predicate: &Predicate) -> SqlResult {
        let clause = SqlWhere::generate(predicate, 0);
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", T::TABLE, clause.query),
            params: clause.params,
        }
    }

    pub fn delete_sql(&self, predicate: &Predicate) -> SqlResult {
        let clause = SqlWhere::generate(predicate, 0);
        SqlResult {
            query: format!("DELETE FROM \"{}\" WHERE {}", T::TABLE, clause.query),
            params: clause.params,
        }
    }

    pub fn insert_sql(&self, doc: &T) -> SqlResult {
        let columns = doc.columns();
        let names: Vec<String> = columns.iter().map(|(field, _)| quote(*field)).collect();
        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("${}{}", i + 1, field.cast()))
            .collect();
        SqlResult {
            query: format!(
                "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
                T::TABLE,
                names.join(", "),
                placeholders.join(", ")
            ),
            params: columns.into_iter().map(|(_, value)| value).collect(),
        }
    }

    pub fn update_sql(&self, doc: &T) -> SqlResult {
        let columns: Vec<(Field, Value)> = doc
            .columns()
            .into_iter()
            .filter(|(field, _)| *field != Field::Id)
            .collect();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ${}{}", quote(*field), i + 1, field.cast()))
            .collect();
        let id_index = columns.len() + 1;
        let mut params: Vec<Value> = columns.into_iter().map(|(_, value)| value).collect();
        params.push(Value::String(doc.id().to_string()));
        SqlResult {
            query: format!(
                "UPDATE \"{}\" SET {} WHERE \"id\" = ${}::uuid RETURNING *",
                T::TABLE,
                assignments.join(", "),
                id_index
            ),
            params,
        }
    }
}

impl<T: Document> Default for QueryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn fetch_all<T>(pool: &PgPool, sql: &SqlResult) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_as(q, p);
    }
    Ok(q.fetch_all(pool).await?)
}

pub async fn fetch_optional<T>(pool: &PgPool, sql: &SqlResult) -> Result<Option<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    let mut q = sqlx::query_as::<_, T>(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query_as(q, p);
    }
    Ok(q.fetch_optional(pool).await?)
}

pub async fn fetch_count(pool: &PgPool, sql: &SqlResult) -> Result<u64, DatabaseError> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    let row = q.fetch_one(pool).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count.max(0) as u64)
}

pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        // JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

pub fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Event, School};
    use uuid::Uuid;

    #[test]
    fn select_orders_newest_first_and_limits() {
        let sql = QueryBuilder::<School>::new()
            .limit(50)
            .select_sql(&Predicate::eq(Field::City, "Springfield"));
        assert_eq!(
            sql.query,
            "SELECT * FROM \"schools\" WHERE \"city\" = $1 ORDER BY \"created_at\" DESC LIMIT 50"
        );
    }

    #[test]
    fn insert_includes_derived_collation_key() {
        let school = School::new("North High", "Springfield");
        let event = Event {
            id: Uuid::new_v4(),
            name: "Алгебра".to_string(),
            schedule: vec![],
            description: None,
            is_active: true,
            school_id: school.id,
            teacher_id: Uuid::new_v4(),
            created_at: school.created_at,
            updated_at: school.created_at,
        };
        let sql = QueryBuilder::<Event>::new().insert_sql(&event);
        assert!(sql.query.starts_with("INSERT INTO \"events\" (\"id\", \"name\", \"name_key\""));
        assert!(sql.query.contains("$4::jsonb"));
        assert!(sql.query.ends_with("RETURNING *"));
        assert_eq!(sql.params[2], Value::String("алгебра".to_string()));
    }

    #[test]
    fn update_binds_id_last() {
        let school = School::new("North High", "Springfield");
        let sql = QueryBuilder::<School>::new().update_sql(&school);
        assert_eq!(
            sql.query,
            "UPDATE \"schools\" SET \"name\" = $1, \"city\" = $2, \"created_at\" = $3::timestamptz WHERE \"id\" = $4::uuid RETURNING *"
        );
        assert_eq!(sql.params.last(), Some(&Value::String(school.id.to_string())));
    }
}
