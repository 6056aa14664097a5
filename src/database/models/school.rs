use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::store::Document;
use crate::filter::Field;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

impl School {
    pub fn new(name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            city: city.into(),
            created_at: Utc::now(),
        }
    }
}

impl Document for School {
    const TABLE: &'static str = "schools";
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
            (Field::Name, json!(self.name)),
            (Field::City, json!(self.city)),
            (Field::CreatedAt, json!(self.created_at)),
        ]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("schools_name_key", self.name.clone())]
    }
}
