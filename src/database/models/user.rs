use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::store::Document;
use crate::filter::Field;
use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Salted digest, see `auth::hash_password`.
    #[serde(skip_serializing, default)]
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// `None` only for main and district administrators.
    pub school_id: Option<Uuid>,
    /// Required for district administrators; their district.
    pub city: Option<String>,
    pub name: Option<String>,
    /// Linked students, parents only.
    #[sqlx(json)]
    #[serde(default)]
    pub children: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, password_digest: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password: password_digest,
            role,
            school_id: None,
            city: None,
            name: None,
            children: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn with_school(mut self, school_id: Uuid) -> Self {
        self.school_id = Some(school_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn has_child(&self, student_id: Uuid) -> bool {
        self.children.contains(&student_id)
    }
}

impl Document for User {
    const TABLE: &'static str = "users";
    const SORT: Field = Field::CreatedAt;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn columns(&self) -> Vec<(Field, Value)> {
        vec![
            (Field::Id, json!(self.id)),
            (Field::Email, json!(self.email)),
            (Field::Password, json!(self.password)),
            (Field::Role, json!(self.role)),
            (Field::SchoolId, json!(self.school_id)),
            (Field::City, json!(self.city)),
            (Field::Name, json!(self.name)),
            (Field::Children, json!(self.children)),
            (Field::CreatedAt, json!(self.created_at)),
        ]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("users_email_key", self.email.clone())]
    }
}
