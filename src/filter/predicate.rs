use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::services::naming::collation_key;

/// Every persisted column a predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    NameKey,
    City,
    CreatedAt,
    UpdatedAt,
    Email,
    Password,
    Role,
    SchoolId,
    Children,
    Group,
    Specialty,
    QrCode,
    UserId,
    Schedule,
    Description,
    IsActive,
    TeacherId,
    StudentId,
    EventName,
    EventKey,
    Timestamp,
    ScannedBy,
    StudentName,
    ArchivedAt,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::NameKey => "name_key",
            Field::City => "city",
            Field::CreatedAt => "created_at",
            Field::UpdatedAt => "updated_at",
            Field::Email => "email",
            Field::Password => "password",
            Field::Role => "role",
            Field::SchoolId => "school_id",
            Field::Children => "children",
            Field::Group => "group",
            Field::Specialty => "specialty",
            Field::QrCode => "qr_code",
            Field::UserId => "user_id",
            Field::Schedule => "schedule",
            Field::Description => "description",
            Field::IsActive => "is_active",
            Field::TeacherId => "teacher_id",
            Field::StudentId => "student_id",
            Field::EventName => "event_name",
            Field::EventKey => "event_key",
            Field::Timestamp => "timestamp",
            Field::ScannedBy => "scanned_by",
            Field::StudentName => "student_name",
            Field::ArchivedAt => "archived_at",
        }
    }

    /// Placeholder cast so text-encoded parameters land in typed columns.
    pub fn cast(&self) -> &'static str {
        match self {
            Field::Id | Field::SchoolId | Field::UserId | Field::TeacherId | Field::StudentId => "::uuid",
            Field::CreatedAt | Field::UpdatedAt | Field::Timestamp | Field::ArchivedAt => "::timestamptz",
            Field::Schedule | Field::Children => "::jsonb",
            _ => "",
        }
    }

    /// Derived column holding the collation key of a human-entered name.
    pub fn collation_column(&self) -> Option<Field> {
        match self {
            Field::Name => Some(Field::NameKey),
            Field::EventName => Some(Field::EventKey),
            _ => None,
        }
    }
}

/// Structured query predicate. Built by the visibility rules, rendered to
/// SQL by [`super::sql::SqlWhere`] or evaluated directly by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Nothing,
    Eq(Field, Value),
    In(Field, Vec<Value>),
    /// Collation-insensitive name equality (see `services::naming`).
    NameEq(Field, String),
    /// Case-insensitive substring match.
    Contains(Field, String),
    Since(Field, DateTime<Utc>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: Field, value: impl Serialize) -> Self {
        Predicate::Eq(field, to_value(value))
    }

    pub fn is_in<I, V>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Serialize,
    {
        Predicate::In(field, values.into_iter().map(to_value).collect())
    }

    pub fn name_eq(field: Field, name: impl Into<String>) -> Self {
        Predicate::NameEq(field, name.into())
    }

    pub fn contains(field: Field, needle: impl Into<String>) -> Self {
        Predicate::Contains(field, needle.into())
    }

    pub fn since(field: Field, at: DateTime<Utc>) -> Self {
        Predicate::Since(field, at)
    }

    /// Conjunction. `All` is the identity, `Nothing` absorbs.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Nothing, _) | (_, Predicate::Nothing) => Predicate::Nothing,
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Evaluate against a document exposing its fields through `lookup`.
    pub fn matches<F>(&self, lookup: &F) -> bool
    where
        F: Fn(Field) -> Value,
    {
        match self {
            Predicate::All => true,
            Predicate::Nothing => false,
            Predicate::Eq(field, value) => lookup(*field) == *value,
            Predicate::In(field, values) => {
                let actual = lookup(*field);
                values.iter().any(|v| *v == actual)
            }
            Predicate::NameEq(field, name) => lookup(*field)
                .as_str()
                .map(|actual| collation_key(actual) == collation_key(name))
                .unwrap_or(false),
            Predicate::Contains(field, needle) => lookup(*field)
                .as_str()
                .map(|actual| actual.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Predicate::Since(field, at) => lookup(*field)
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| ts.with_timezone(&Utc) >= *at)
                .unwrap_or(false),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(lookup)),
        }
    }
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(field: Field) -> Value {
        match field {
            Field::Name => json!("Урок Истории"),
            Field::City => json!("Springfield"),
            Field::SchoolId => json!("6f1c1f5e-6d43-4c36-9c1d-7a3c4f8f0a11"),
            Field::Timestamp => json!("2026-03-01T10:00:00Z"),
            _ => Value::Null,
        }
    }

    #[test]
    fn and_flattens_and_respects_identities() {
        let a = Predicate::eq(Field::City, "Springfield");
        let b = Predicate::eq(Field::IsActive, true);
        assert_eq!(Predicate::All.and(a.clone()), a);
        assert_eq!(a.clone().and(Predicate::Nothing), Predicate::Nothing);
        let both = a.clone().and(b.clone()).and(Predicate::All);
        assert_eq!(both, Predicate::And(vec![a, b]));
    }

    #[test]
    fn empty_membership_matches_nothing() {
        let empty: Vec<Uuid> = vec![];
        assert!(!Predicate::is_in(Field::SchoolId, empty).matches(&doc));
    }

    #[test]
    fn name_equality_ignores_case() {
        assert!(Predicate::name_eq(Field::Name, "урок истории").matches(&doc));
        assert!(Predicate::name_eq(Field::Name, "  УРОК ИСТОРИИ ").matches(&doc));
        assert!(!Predicate::name_eq(Field::Name, "Урок").matches(&doc));
    }

    #[test]
    fn contains_and_since() {
        assert!(Predicate::contains(Field::City, "field").matches(&doc));
        let before = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let after = DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z").unwrap().with_timezone(&Utc);
        assert!(Predicate::since(Field::Timestamp, before).matches(&doc));
        assert!(!Predicate::since(Field::Timestamp, after).matches(&doc));
    }
}
