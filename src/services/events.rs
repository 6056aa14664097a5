//! Event lifecycle. Deactivation archives the live ledger of the event.

use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::ledger::live_marks_of;
use super::naming::display_name;
use super::tenancy::Scope;
use super::visibility::{authorize_event, ListRequest};
use super::{Caller, ServiceError, ServiceResult};
use crate::database::models::{Event, ScheduleSlot};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

const DUPLICATE_NAME: &str = "An event with this name already exists in this school";

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: Option<String>,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlot>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub teacher_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventChanges {
    pub name: Option<String>,
    pub schedule: Option<Vec<ScheduleSlot>>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Toggled {
    pub event: Event,
    /// Live marks moved to history by this transition.
    pub archived: u64,
}

pub fn validate_schedule(schedule: &[ScheduleSlot]) -> ServiceResult<()> {
    for slot in schedule {
        let start = parse_time(&slot.start_time)?;
        let end = parse_time(&slot.end_time)?;
        if start >= end {
            return Err(ServiceError::validation(format!(
                "Schedule slot {}-{} must start before it ends",
                slot.start_time, slot.end_time
            )));
        }
    }
    Ok(())
}

fn parse_time(value: &str) -> ServiceResult<NaiveTime> {
    // Strictly HH:mm, 24h.
    if value.len() != 5 {
        return Err(ServiceError::validation(format!("Invalid time '{}', expected HH:mm", value)));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ServiceError::validation(format!("Invalid time '{}', expected HH:mm", value)))
}

fn event_name(raw: Option<&str>) -> ServiceResult<String> {
    let name = display_name(raw.unwrap_or_default());
    if name.is_empty() {
        return Err(ServiceError::validation("Event name is required"));
    }
    Ok(name)
}

async fn find_event(store: &dyn Store, id: Uuid) -> ServiceResult<Event> {
    store
        .events()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Event not found"))
}

/// The teacher must be a `teacher` account of the event's school.
async fn check_teacher(store: &dyn Store, teacher_id: Uuid, school_id: Uuid) -> ServiceResult<()> {
    let predicate = Predicate::eq(Field::Id, teacher_id)
        .and(Predicate::eq(Field::Role, Role::Teacher))
        .and(Predicate::eq(Field::SchoolId, school_id));
    match store.users().find_one(&predicate).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::validation(
            "Invalid teacher: not found or doesn't belong to the school",
        )),
    }
}

/// Copies the live marks of `event` into history and clears them.
async fn archive(store: &dyn Store, event: &Event) -> ServiceResult<u64> {
    let moved = store
        .archive_attendance(&live_marks_of(event), Utc::now())
        .await
        .map_err(|err| {
            warn!(event = %event.id, "archiving live marks failed: {}", err);
            ServiceError::from(err)
        })?;
    if moved > 0 {
        info!(event = %event.id, name = %event.name, moved, "archived live attendance on deactivation");
    }
    Ok(moved)
}

pub async fn list(store: &dyn Store, caller: &Caller, school_id: Option<Uuid>, active_only: bool) -> ServiceResult<Vec<Event>> {
    let scope = Scope::resolve(store, caller).await?;
    let predicate = ListRequest::Events { school_id, active_only }
        .filter(store, caller, &scope)
        .await?;
    Ok(store.events().list(&predicate).await?)
}

pub async fn get(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<Event> {
    let event = find_event(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_event(caller, &scope, &event)?;
    Ok(event)
}

pub async fn by_teacher(store: &dyn Store, caller: &Caller, teacher_id: Uuid) -> ServiceResult<Vec<Event>> {
    caller.require_staff()?;
    if caller.role == Role::Teacher && caller.user_id != teacher_id {
        return Err(ServiceError::access_denied("Access denied"));
    }
    let scope = Scope::resolve(store, caller).await?;
    let predicate = scope.predicate().and(Predicate::eq(Field::TeacherId, teacher_id));
    Ok(store.events().list(&predicate).await?)
}

pub async fn create(store: &dyn Store, caller: &Caller, new: NewEvent) -> ServiceResult<Event> {
    caller.require_admin()?;
    let school_id = new.school_id.ok_or_else(|| ServiceError::validation("School ID required"))?;
    Scope::resolve(store, caller).await?.authorize(school_id)?;
    if store.schools().find_by_id(school_id).await?.is_none() {
        return Err(ServiceError::validation("School not found"));
    }
    let teacher_id = new.teacher_id.ok_or_else(|| ServiceError::validation("Teacher ID required"))?;
    check_teacher(store, teacher_id, school_id).await?;
    let name = event_name(new.name.as_deref())?;
    validate_schedule(&new.schedule)?;

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        name,
        schedule: new.schedule,
        description: new.description,
        is_active: new.is_active.unwrap_or(false),
        school_id,
        teacher_id,
        created_at: now,
        updated_at: now,
    };
    let event = store
        .events()
        .insert(event)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_NAME))?;
    info!(event = %event.id, school = %school_id, "event created");
    Ok(event)
}

/// Field update. Live marks keep their event name: a rename does not
/// relabel them. Setting `is_active` to false archives like a toggle.
pub async fn update(store: &dyn Store, caller: &Caller, id: Uuid, changes: EventChanges) -> ServiceResult<Event> {
    caller.require_admin()?;
    let mut event = find_event(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_event(caller, &scope, &event)?;

    if let Some(teacher_id) = changes.teacher_id {
        check_teacher(store, teacher_id, event.school_id).await?;
        event.teacher_id = teacher_id;
    }
    if let Some(schedule) = changes.schedule {
        validate_schedule(&schedule)?;
        event.schedule = schedule;
    }
    let previous = event.clone();
    if let Some(name) = changes.name {
        let name = event_name(Some(name.as_str()))?;
        let same_name = Predicate::eq(Field::SchoolId, event.school_id).and(Predicate::name_eq(Field::Name, &name));
        let clash = store.events().find(&same_name).await?.into_iter().any(|other| other.id != event.id);
        if clash {
            return Err(ServiceError::Conflict(DUPLICATE_NAME.to_string()));
        }
        event.name = name;
    }
    if let Some(description) = changes.description {
        event.description = Some(description);
    }
    if let Some(is_active) = changes.is_active {
        event.is_active = is_active;
    }
    event.updated_at = Utc::now();

    let event = store
        .events()
        .update(event)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_NAME))?
        .ok_or_else(|| ServiceError::not_found("Event not found"))?;
    if changes.is_active == Some(false) {
        // Live marks carry the name they were scanned under.
        archive(store, &previous).await?;
    }
    Ok(event)
}

/// Sets the active flag; `None` flips it. Any deactivation request archives
/// whatever is live for the event.
pub async fn set_active(store: &dyn Store, caller: &Caller, id: Uuid, is_active: Option<bool>) -> ServiceResult<Toggled> {
    caller.require_staff()?;
    let mut event = find_event(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_event(caller, &scope, &event)?;

    let target = is_active.unwrap_or(!event.is_active);
    event.is_active = target;
    event.updated_at = Utc::now();
    let event = store
        .events()
        .update(event)
        .await?
        .ok_or_else(|| ServiceError::not_found("Event not found"))?;
    let archived = if target { 0 } else { archive(store, &event).await? };
    info!(event = %event.id, active = target, "event toggled");
    Ok(Toggled { event, archived })
}

/// Deletes the event and its live marks. History is kept.
pub async fn delete(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<u64> {
    caller.require_admin()?;
    let event = find_event(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_event(caller, &scope, &event)?;

    store.events().delete(&Predicate::eq(Field::Id, event.id)).await?;
    let removed = store.attendance().delete(&live_marks_of(&event)).await?;
    info!(event = %event.id, removed, "event deleted");
    Ok(removed)
}
