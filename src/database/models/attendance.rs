use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::store::Document;
use crate::filter::Field;
use crate::services::naming::collation_key;

/// A live attendance mark.
///
/// `event_name` is a snapshot of the event's name at scan time, not a
/// reference: renaming or deleting the event leaves it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
    pub scanned_by: String,
    pub school_id: Uuid,
    #[serde(rename = "studentName")]
    pub student_name: Option<String>,
}

impl AttendanceRecord {
    /// Copy destined for the historical ledger. Gets its own id.
    pub fn to_history(&self, archived_at: DateTime<Utc>) -> HistoricalAttendanceRecord {
        HistoricalAttendanceRecord {
            id: Uuid::new_v4(),
            student_id: self.student_id,
            event_name: self.event_name.clone(),
            timestamp: self.timestamp,
            scanned_by: self.scanned_by.clone(),
            school_id: self.school_id,
            student_name: self.student_name.clone(),
            archived_at,
        }
    }
}

impl Document for AttendanceRecord {
    const TABLE: &'static str = "attendance";
    const SORT: Field = Field::Timestamp;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn columns(&self) -> Vec<(Field, Value)> {
        vec![
            (Field::Id, json!(self.id)),
            (Field::StudentId, json!(self.student_id)),
            (Field::EventName, json!(self.event_name)),
            (Field::EventKey, json!(collation_key(&self.event_name))),
            (Field::Timestamp, json!(self.timestamp)),
            (Field::ScannedBy, json!(self.scanned_by)),
            (Field::SchoolId, json!(self.school_id)),
            (Field::StudentName, json!(self.student_name)),
        ]
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(
            "attendance_student_event_school_key",
            format!("{}/{}/{}", self.student_id, collation_key(&self.event_name), self.school_id),
        )]
    }
}

/// Append-only audit row. No uniqueness: the same student/event pair
/// reappears once per activation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoricalAttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub event_name: String,
    pub timestamp: DateTime<Utc>,
    pub scanned_by: String,
    pub school_id: Uuid,
    #[serde(rename = "studentName")]
    pub student_name: Option<String>,
    pub archived_at: DateTime<Utc>,
}

impl Document for HistoricalAttendanceRecord {
    const TABLE: &'static str = "historical_attendance";
    const SORT: Field = Field::Timestamp;

    fn id(&self) -> Uuid {
        self.id
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn columns(&self) -> Vec<(Field, Value)> {
        vec![
            (Field::Id, json!(self.id)),
            (Field::StudentId, json!(self.student_id)),
            (Field::EventName, json!(self.event_name)),
            (Field::EventKey, json!(collation_key(&self.event_name))),
            (Field::Timestamp, json!(self.timestamp)),
            (Field::ScannedBy, json!(self.scanned_by)),
            (Field::SchoolId, json!(self.school_id)),
            (Field::StudentName, json!(self.student_name)),
            (Field::ArchivedAt, json!(self.archived_at)),
        ]
    }
}
