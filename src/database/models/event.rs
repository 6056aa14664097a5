use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::store::Document;
use crate::filter::Field;
use crate::services::naming::collation_key;
use crate::types::DayOfWeek;

/// One weekly slot of a recurring class session. Times are `HH:mm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    #[serde(rename = "dayOfWeek")]
    pub day_of_week: DayOfWeek,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub schedule: Vec<ScheduleSlot>,
    pub description: Option<String>,
    pub is_active: bool,
    pub school_id: Uuid,
    pub teacher_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Event {
    const TABLE: &'static str = "events";
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
            (Field::NameKey, json!(collation_key(&self.name))),
            (Field::Schedule, json!(self.schedule)),
            (Field::Description, json!(self.description)),
            (Field::IsActive, json!(self.is_active)),
            (Field::SchoolId, json!(self.school_id)),
            (Field::TeacherId, json!(self.teacher_id)),
            (Field::CreatedAt, json!(self.created_at)),
            (Field::UpdatedAt, json!(self.updated_at)),
        ]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "events_school_name_key",
            format!("{}/{}", self.school_id, collation_key(&self.name)),
        )]
    }
}
