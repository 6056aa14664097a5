use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::store::Document;
use crate::filter::Field;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    pub specialty: String,
    pub qr_code: String,
    pub school_id: Uuid,
    /// The `student` account created in lockstep with this record.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Document for Student {
    const TABLE: &'static str = "students";
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
            (Field::Group, json!(self.group)),
            (Field::Specialty, json!(self.specialty)),
            (Field::QrCode, json!(self.qr_code)),
            (Field::SchoolId, json!(self.school_id)),
            (Field::UserId, json!(self.user_id)),
            (Field::CreatedAt, json!(self.created_at)),
        ]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("students_qr_code_key", self.qr_code.clone()),
            ("students_user_id_key", self.user_id.to_string()),
        ]
    }
}
