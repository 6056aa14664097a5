use serde::Serialize;

use super::tenancy::Scope;
use super::{Caller, ServiceResult};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersByRole {
    pub teachers: u64,
    pub parents: u64,
    pub students: u64,
    pub school_admins: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_admins: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_admins: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolAttendance {
    pub school_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_users: u64,
    pub users_by_role: UsersByRole,
    pub total_schools: u64,
    pub total_students: u64,
    pub total_events: u64,
    /// Live plus historical rows, mirrors included.
    pub total_attendance: u64,
    pub attendance_by_school: Vec<SchoolAttendance>,
}

/// Totals within the caller's scope.
pub async fn summary(store: &dyn Store, caller: &Caller) -> ServiceResult<Analytics> {
    caller.require_role(&[Role::MainAdmin, Role::SchoolAdmin, Role::DistrictAdmin])?;
    let scope = Scope::resolve(store, caller).await?;
    let in_scope = scope.predicate();
    let unrestricted = matches!(scope, Scope::Unrestricted);

    let role_count = |role: Role| {
        let predicate = in_scope.clone().and(Predicate::eq(Field::Role, role));
        async move { store.users().count(&predicate).await }
    };
    let mut users_by_role = UsersByRole {
        teachers: role_count(Role::Teacher).await?,
        parents: role_count(Role::Parent).await?,
        students: role_count(Role::Student).await?,
        school_admins: role_count(Role::SchoolAdmin).await?,
        ..Default::default()
    };
    let mut total_users = users_by_role.teachers + users_by_role.parents + users_by_role.students + users_by_role.school_admins;
    if unrestricted {
        let main = role_count(Role::MainAdmin).await?;
        let district = role_count(Role::DistrictAdmin).await?;
        total_users += main + district;
        users_by_role.main_admins = Some(main);
        users_by_role.district_admins = Some(district);
    }

    let schools = store.schools().find(&scope.predicate_on(Field::Id)).await?;
    let mut attendance_by_school = Vec::with_capacity(schools.len());
    for school in &schools {
        let at_school = Predicate::eq(Field::SchoolId, school.id);
        let count = store.attendance().count(&at_school).await? + store.history().count(&at_school).await?;
        attendance_by_school.push(SchoolAttendance {
            school_name: school.name.clone(),
            count,
        });
    }
    attendance_by_school.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.school_name.cmp(&b.school_name)));

    Ok(Analytics {
        total_users,
        users_by_role,
        total_schools: schools.len() as u64,
        total_students: store.students().count(&in_scope).await?,
        total_events: store.events().count(&in_scope).await?,
        total_attendance: store.attendance().count(&in_scope).await? + store.history().count(&in_scope).await?,
        attendance_by_school,
    })
}
