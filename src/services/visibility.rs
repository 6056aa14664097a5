//! Query predicates and object checks derived from a caller and its scope.
//!
//! Lists go through [`ListRequest::filter`]; single objects fetched by id go
//! through the `authorize_*` checks. Both fail with `AccessDenied` before any
//! mutation is attempted.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::tenancy::Scope;
use super::{Caller, ServiceError, ServiceResult};
use crate::database::models::{Event, Student, User};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

/// City filter value meaning "no city filter".
pub const ALL_CITIES: &str = "all";

#[derive(Debug, Clone, Default)]
pub struct SchoolQuery {
    pub city: Option<String>,
    pub search: Option<String>,
}

/// One variant per listable resource, carrying the caller-supplied filters.
#[derive(Debug, Clone)]
pub enum ListRequest {
    Schools(SchoolQuery),
    Users { school_id: Option<Uuid>, role: Option<Role> },
    Students { school_id: Option<Uuid> },
    Events { school_id: Option<Uuid>, active_only: bool },
    Attendance {
        school_id: Option<Uuid>,
        city: Option<String>,
        since: Option<DateTime<Utc>>,
    },
}

impl ListRequest {
    pub async fn filter(&self, store: &dyn Store, caller: &Caller, scope: &Scope) -> ServiceResult<Predicate> {
        match self {
            ListRequest::Schools(query) => school_filter(caller, scope, query),
            ListRequest::Users { school_id, role } => {
                caller.require_staff()?;
                if caller.role == Role::DistrictAdmin && *role == Some(Role::DistrictAdmin) {
                    warn!(user = %caller.user_id, "district admin listing district admins");
                    return Err(ServiceError::access_denied("Access denied"));
                }
                let mut predicate = scope.narrow(*school_id)?;
                if let Some(role) = role {
                    predicate = predicate.and(Predicate::eq(Field::Role, role));
                }
                Ok(predicate)
            }
            ListRequest::Students { school_id } => {
                caller.require_staff()?;
                scope.narrow(*school_id)
            }
            ListRequest::Events { school_id, active_only } => {
                let mut predicate = scope.narrow(*school_id)?;
                if caller.role == Role::Teacher {
                    predicate = predicate.and(Predicate::eq(Field::TeacherId, caller.user_id));
                }
                if *active_only {
                    predicate = predicate.and(Predicate::eq(Field::IsActive, true));
                }
                Ok(predicate)
            }
            ListRequest::Attendance { school_id, city, since } => {
                caller.require_staff()?;
                let mut predicate = scope.narrow(*school_id)?;
                if let Some(city) = city.as_deref().filter(|c| *c != ALL_CITIES) {
                    // Intersected with the scope, never a replacement for it.
                    let in_city = store.schools().find(&Predicate::eq(Field::City, city)).await?;
                    predicate = predicate.and(Predicate::is_in(Field::SchoolId, in_city.iter().map(|s| s.id)));
                }
                if let Some(since) = since {
                    predicate = predicate.and(Predicate::since(Field::Timestamp, *since));
                }
                Ok(predicate)
            }
        }
    }
}

fn school_filter(caller: &Caller, scope: &Scope, query: &SchoolQuery) -> ServiceResult<Predicate> {
    caller.require_role(&[Role::MainAdmin, Role::SchoolAdmin, Role::DistrictAdmin])?;
    let requested_city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty() && *c != ALL_CITIES);

    let mut predicate = match scope {
        Scope::Unrestricted => match requested_city {
            Some(city) => Predicate::eq(Field::City, city),
            None => Predicate::All,
        },
        Scope::District { city, .. } => {
            if let Some(requested) = requested_city {
                if requested != city.as_str() {
                    warn!(user = %caller.user_id, %requested, "district admin filtered by foreign city");
                    return Err(ServiceError::access_denied("Access denied: Cannot filter by different city"));
                }
            }
            scope.predicate_on(Field::Id)
        }
        Scope::School(_) => scope.predicate_on(Field::Id),
    };

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        predicate = predicate.and(Predicate::contains(Field::Name, search));
    }
    Ok(predicate)
}

/// Event must be in scope; a teacher must also be the event's teacher.
pub fn authorize_event(caller: &Caller, scope: &Scope, event: &Event) -> ServiceResult<()> {
    scope.authorize(event.school_id)?;
    if caller.role == Role::Teacher && event.teacher_id != caller.user_id {
        warn!(user = %caller.user_id, event = %event.id, "teacher does not own event");
        return Err(ServiceError::access_denied("Access denied"));
    }
    Ok(())
}

/// Cross-school account mutation check.
pub fn authorize_user_target(caller: &Caller, scope: &Scope, target: &User) -> ServiceResult<()> {
    if matches!(scope, Scope::Unrestricted) {
        return Ok(());
    }
    // Only main administrators touch administrator accounts without a school.
    if matches!(target.role, Role::MainAdmin | Role::DistrictAdmin) {
        warn!(user = %caller.user_id, target = %target.id, "administrator account out of reach");
        return Err(ServiceError::access_denied("Access denied"));
    }
    match target.school_id {
        Some(school_id) => scope.authorize(school_id),
        None => Err(ServiceError::access_denied("Access denied")),
    }
}

/// Who may read a single student record: staff within scope, the
/// student's own account, or a parent listing the student as a child.
pub async fn authorize_student_view(
    store: &dyn Store,
    caller: &Caller,
    scope: &Scope,
    student: &Student,
) -> ServiceResult<()> {
    match caller.role {
        Role::Parent => authorize_child(store, caller, student.id).await,
        Role::Student => {
            if student.user_id == caller.user_id {
                Ok(())
            } else {
                Err(ServiceError::access_denied("Access denied"))
            }
        }
        _ => scope.authorize(student.school_id),
    }
}

/// Membership check against the parent's current `children` set.
pub async fn authorize_child(store: &dyn Store, caller: &Caller, student_id: Uuid) -> ServiceResult<()> {
    let parent = store
        .users()
        .find_by_id(caller.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    if parent.has_child(student_id) {
        Ok(())
    } else {
        warn!(user = %caller.user_id, student = %student_id, "parent requested a student outside their children");
        Err(ServiceError::access_denied("Access denied"))
    }
}
