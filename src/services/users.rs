use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::tenancy::Scope;
use super::visibility::{authorize_user_target, ListRequest};
use super::{required, Caller, ServiceError, ServiceResult};
use crate::auth::hash_password;
use crate::database::models::{Student, User};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

pub(crate) const DUPLICATE_EMAIL: &str = "A user with this email already exists";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
}

async fn find_user(store: &dyn Store, id: Uuid) -> ServiceResult<User> {
    store
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

/// Loads a target account the caller may mutate.
async fn target(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<(Scope, User)> {
    caller.require_admin()?;
    let user = find_user(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_user_target(caller, &scope, &user)?;
    Ok((scope, user))
}

pub async fn list(store: &dyn Store, caller: &Caller, school_id: Option<Uuid>, role: Option<Role>) -> ServiceResult<Vec<User>> {
    let scope = Scope::resolve(store, caller).await?;
    let mut predicate = ListRequest::Users { school_id, role }.filter(store, caller, &scope).await?;
    if !matches!(scope, Scope::Unrestricted) {
        // Schoolless administrator accounts never fall inside a bounded scope.
        predicate = predicate.and(Predicate::is_in(
            Field::Role,
            [Role::Teacher, Role::Parent, Role::Student, Role::SchoolAdmin],
        ));
    }
    Ok(store.users().list(&predicate).await?)
}

pub async fn update(store: &dyn Store, caller: &Caller, id: Uuid, changes: UserChanges) -> ServiceResult<User> {
    let (_, mut user) = target(store, caller, id).await?;
    if changes.email.is_some() {
        user.email = required(changes.email.as_deref(), "Email")?;
    }
    if let Some(password) = changes.password.as_deref().filter(|p| !p.is_empty()) {
        user.password = hash_password(password);
    }
    if let Some(name) = changes.name {
        user.name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
    }
    if changes.city.is_some() {
        user.city = Some(required(changes.city.as_deref(), "City")?);
    }
    if user.role.requires_name() && user.name.is_none() {
        return Err(ServiceError::validation("Name is required for this role"));
    }
    let user = store
        .users()
        .update(user)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_EMAIL))?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;
    info!(user = %user.id, by = %caller.user_id, "user updated");
    Ok(user)
}

pub async fn delete(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<()> {
    let (_, user) = target(store, caller, id).await?;
    if user.id == caller.user_id {
        return Err(ServiceError::validation("Cannot delete your own account"));
    }
    store.users().delete(&Predicate::eq(Field::Id, user.id)).await?;
    info!(user = %user.id, by = %caller.user_id, "user deleted");
    Ok(())
}

/// Parent and student must both be inside the caller's scope.
async fn parent_and_child(store: &dyn Store, caller: &Caller, parent_id: Uuid, student_id: Uuid) -> ServiceResult<(User, Student)> {
    let (scope, parent) = target(store, caller, parent_id).await?;
    if parent.role != Role::Parent {
        return Err(ServiceError::validation("Not a parent"));
    }
    let student = store
        .students()
        .find_by_id(student_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))?;
    scope.authorize(student.school_id)?;
    Ok((parent, student))
}

pub async fn add_child(store: &dyn Store, caller: &Caller, parent_id: Uuid, student_id: Uuid) -> ServiceResult<User> {
    let (mut parent, student) = parent_and_child(store, caller, parent_id, student_id).await?;
    if !parent.has_child(student.id) {
        parent.children.push(student.id);
    }
    info!(parent = %parent.id, student = %student.id, "child linked");
    store
        .users()
        .update(parent)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

pub async fn remove_child(store: &dyn Store, caller: &Caller, parent_id: Uuid, student_id: Uuid) -> ServiceResult<User> {
    let (mut parent, student) = parent_and_child(store, caller, parent_id, student_id).await?;
    parent.children.retain(|id| *id != student.id);
    info!(parent = %parent.id, student = %student.id, "child unlinked");
    store
        .users()
        .update(parent)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

pub async fn my_children(store: &dyn Store, caller: &Caller) -> ServiceResult<Vec<Student>> {
    caller.require_role(&[Role::Parent])?;
    let parent = find_user(store, caller.user_id).await?;
    Ok(store
        .students()
        .find(&Predicate::is_in(Field::Id, parent.children.iter()))
        .await?)
}

pub async fn my_student(store: &dyn Store, caller: &Caller) -> ServiceResult<Student> {
    caller.require_role(&[Role::Student])?;
    store
        .students()
        .find_one(&Predicate::eq(Field::UserId, caller.user_id))
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn district_admin_sees_only_school_bound_accounts_of_its_city() {
        let fx = Fixture::seeded().await;
        let users = list(fx.store(), &fx.district_admin(), None, None).await.unwrap();
        assert!(users.iter().all(|u| u.school_id == Some(fx.north.id) || u.school_id == Some(fx.south.id)));
        assert!(!users.iter().any(|u| u.id == fx.main_admin.id || u.id == fx.district_admin.id));
        assert!(list(fx.store(), &fx.district_admin(), None, Some(Role::DistrictAdmin)).await.is_err());

        let all = list(fx.store(), &fx.main_admin(), None, Some(Role::DistrictAdmin)).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn cross_school_updates_are_denied() {
        let fx = Fixture::seeded().await;
        let changes = UserChanges {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update(fx.store(), &fx.school_admin(), fx.metro_teacher.id, changes.clone()).await,
            Err(ServiceError::AccessDenied(_))
        ));
        assert!(matches!(
            update(fx.store(), &fx.district_admin(), fx.main_admin.id, changes.clone()).await,
            Err(ServiceError::AccessDenied(_))
        ));
        let renamed = update(fx.store(), &fx.school_admin(), fx.teacher.id, changes).await.unwrap();
        assert_eq!(renamed.name.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn email_stays_unique_and_password_is_rehashed() {
        let fx = Fixture::seeded().await;
        let taken = UserChanges {
            email: Some(fx.parent.email.clone()),
            ..Default::default()
        };
        assert!(matches!(
            update(fx.store(), &fx.school_admin(), fx.teacher.id, taken).await,
            Err(ServiceError::Conflict(_))
        ));
        let changes = UserChanges {
            password: Some("new-secret".to_string()),
            ..Default::default()
        };
        let updated = update(fx.store(), &fx.school_admin(), fx.teacher.id, changes).await.unwrap();
        assert!(verify_password("new-secret", &updated.password));
    }

    #[tokio::test]
    async fn children_are_linked_within_scope() {
        let fx = Fixture::seeded().await;
        assert!(matches!(
            add_child(fx.store(), &fx.school_admin(), fx.teacher.id, fx.alice.id).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            add_child(fx.store(), &fx.school_admin(), fx.parent.id, fx.carol.id).await,
            Err(ServiceError::AccessDenied(_))
        ));
        let parent = add_child(fx.store(), &fx.district_admin(), fx.parent.id, fx.bob.id).await.unwrap();
        assert_eq!(parent.children.len(), 2);

        let children = my_children(fx.store(), &fx.parent()).await.unwrap();
        assert_eq!(children.len(), 2);

        let parent = remove_child(fx.store(), &fx.school_admin(), fx.parent.id, fx.alice.id).await.unwrap();
        assert_eq!(parent.children, vec![fx.bob.id]);
    }

    #[tokio::test]
    async fn student_finds_own_record() {
        let fx = Fixture::seeded().await;
        assert_eq!(my_student(fx.store(), &fx.student()).await.unwrap().id, fx.alice.id);
        assert!(my_student(fx.store(), &fx.parent()).await.is_err());
    }
}
