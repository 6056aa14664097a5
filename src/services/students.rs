//! Students and their linked `student` accounts, kept in lockstep.

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::tenancy::Scope;
use super::users::DUPLICATE_EMAIL;
use super::visibility::{authorize_student_view, ListRequest};
use super::{required, Caller, ServiceError, ServiceResult};
use crate::auth::hash_password;
use crate::database::models::{Student, User};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub name: Option<String>,
    pub group: Option<String>,
    pub specialty: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentChanges {
    pub name: Option<String>,
    pub group: Option<String>,
    pub specialty: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub school_id: Option<Uuid>,
}

async fn find_student(store: &dyn Store, id: Uuid) -> ServiceResult<Student> {
    store
        .students()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))
}

async fn school_in_scope(store: &dyn Store, scope: &Scope, school_id: Uuid) -> ServiceResult<()> {
    scope.authorize(school_id)?;
    match store.schools().find_by_id(school_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::validation("School not found")),
    }
}

pub async fn list(store: &dyn Store, caller: &Caller, school_id: Option<Uuid>) -> ServiceResult<Vec<Student>> {
    let scope = Scope::resolve(store, caller).await?;
    let predicate = ListRequest::Students { school_id }.filter(store, caller, &scope).await?;
    Ok(store.students().list(&predicate).await?)
}

pub async fn get(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<Student> {
    let student = find_student(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    authorize_student_view(store, caller, &scope, &student).await?;
    Ok(student)
}

/// QR lookup for scanners. A code from another school reads as unknown.
pub async fn by_qr(store: &dyn Store, caller: &Caller, code: &str) -> ServiceResult<Student> {
    caller.require_staff()?;
    let scope = Scope::resolve(store, caller).await?;
    let predicate = scope.predicate().and(Predicate::eq(Field::QrCode, code));
    store
        .students()
        .find_one(&predicate)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))
}

pub async fn create(store: &dyn Store, caller: &Caller, new: NewStudent) -> ServiceResult<Student> {
    caller.require_admin()?;
    let school_id = new.school_id.ok_or_else(|| ServiceError::validation("School ID required"))?;
    let scope = Scope::resolve(store, caller).await?;
    school_in_scope(store, &scope, school_id).await?;

    let name = required(new.name.as_deref(), "Name")?;
    let group = required(new.group.as_deref(), "Group")?;
    let specialty = required(new.specialty.as_deref(), "Specialty")?;
    let email = required(new.email.as_deref(), "Email")?;
    let password = required(new.password.as_deref(), "Password")?;

    let account = User::new(email, hash_password(&password), Role::Student)
        .with_school(school_id)
        .with_name(name.clone());
    let account = store
        .users()
        .insert(account)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_EMAIL))?;

    let student = Student {
        id: Uuid::new_v4(),
        name,
        group,
        specialty,
        qr_code: Uuid::new_v4().to_string(),
        school_id,
        user_id: account.id,
        created_at: Utc::now(),
    };
    match store.students().insert(student).await {
        Ok(student) => {
            info!(student = %student.id, school = %school_id, "student created");
            Ok(student)
        }
        Err(err) => {
            error!(user = %account.id, "student insert failed, removing account: {}", err);
            store.users().delete(&Predicate::eq(Field::Id, account.id)).await?;
            Err(err.into())
        }
    }
}

pub async fn update(store: &dyn Store, caller: &Caller, id: Uuid, changes: StudentChanges) -> ServiceResult<Student> {
    caller.require_admin()?;
    let mut student = find_student(store, id).await?;
    let scope = Scope::resolve(store, caller).await?;
    scope.authorize(student.school_id)?;

    if let Some(school_id) = changes.school_id.filter(|id| *id != student.school_id) {
        school_in_scope(store, &scope, school_id).await?;
        student.school_id = school_id;
    }
    if changes.name.is_some() {
        student.name = required(changes.name.as_deref(), "Name")?;
    }
    if changes.group.is_some() {
        student.group = required(changes.group.as_deref(), "Group")?;
    }
    if changes.specialty.is_some() {
        student.specialty = required(changes.specialty.as_deref(), "Specialty")?;
    }

    if let Some(mut account) = store.users().find_by_id(student.user_id).await? {
        if changes.email.is_some() {
            account.email = required(changes.email.as_deref(), "Email")?;
        }
        if let Some(password) = changes.password.as_deref().filter(|p| !p.is_empty()) {
            account.password = hash_password(password);
        }
        account.school_id = Some(student.school_id);
        account.name = Some(student.name.clone());
        store
            .users()
            .update(account)
            .await
            .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_EMAIL))?;
    }

    store
        .students()
        .update(student)
        .await?
        .ok_or_else(|| ServiceError::not_found("Student not found"))
}

/// Deletes the student and its account. Attendance rows stay and show the
/// scan-time name.
pub async fn delete(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<()> {
    caller.require_admin()?;
    let student = find_student(store, id).await?;
    Scope::resolve(store, caller).await?.authorize(student.school_id)?;
    store.students().delete(&Predicate::eq(Field::Id, student.id)).await?;
    store.users().delete(&Predicate::eq(Field::Id, student.user_id)).await?;
    info!(student = %student.id, "student deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::testing::Fixture;

    fn new_student(school: Uuid, email: &str) -> NewStudent {
        NewStudent {
            name: Some("Dmitri".to_string()),
            group: Some("10B".to_string()),
            specialty: Some("Physics".to_string()),
            email: Some(email.to_string()),
            password: Some("pw".to_string()),
            school_id: Some(school),
        }
    }

    #[tokio::test]
    async fn create_links_a_student_account() {
        let fx = Fixture::seeded().await;
        let student = create(fx.store(), &fx.school_admin(), new_student(fx.north.id, "d@north.test"))
            .await
            .unwrap();
        let account = fx.store().users().find_by_id(student.user_id).await.unwrap().unwrap();
        assert_eq!(account.role, Role::Student);
        assert_eq!(account.school_id, Some(fx.north.id));
        assert!(Uuid::parse_str(&student.qr_code).is_ok());
        assert_eq!(by_qr(fx.store(), &fx.teacher(), &student.qr_code).await.unwrap().id, student.id);
    }

    #[tokio::test]
    async fn create_is_scoped_and_rejects_taken_email() {
        let fx = Fixture::seeded().await;
        assert!(matches!(
            create(fx.store(), &fx.school_admin(), new_student(fx.metro.id, "d@metro.test")).await,
            Err(ServiceError::AccessDenied(_))
        ));
        let before = fx.store().students().count(&Predicate::All).await.unwrap();
        assert!(matches!(
            create(fx.store(), &fx.school_admin(), new_student(fx.north.id, "teacher@north.test")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(fx.store().students().count(&Predicate::All).await.unwrap(), before);
    }

    #[tokio::test]
    async fn qr_lookup_is_scoped() {
        let fx = Fixture::seeded().await;
        assert!(matches!(
            by_qr(fx.store(), &fx.teacher(), &fx.carol.qr_code).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(by_qr(fx.store(), &fx.parent(), &fx.alice.qr_code).await.is_err());
    }

    #[tokio::test]
    async fn view_rules() {
        let fx = Fixture::seeded().await;
        assert!(get(fx.store(), &fx.parent(), fx.alice.id).await.is_ok());
        assert!(get(fx.store(), &fx.parent(), fx.bob.id).await.is_err());
        assert!(get(fx.store(), &fx.student(), fx.alice.id).await.is_ok());
        assert!(get(fx.store(), &fx.student(), fx.bob.id).await.is_err());
        assert!(get(fx.store(), &fx.teacher(), fx.carol.id).await.is_err());
        assert_eq!(list(fx.store(), &fx.district_admin(), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_forwards_account_fields_and_moves_school() {
        let fx = Fixture::seeded().await;
        let changes = StudentChanges {
            password: Some("fresh".to_string()),
            school_id: Some(fx.south.id),
            ..Default::default()
        };
        let moved = update(fx.store(), &fx.district_admin(), fx.alice.id, changes).await.unwrap();
        assert_eq!(moved.school_id, fx.south.id);
        let account = fx.store().users().find_by_id(fx.alice.user_id).await.unwrap().unwrap();
        assert_eq!(account.school_id, Some(fx.south.id));
        assert!(verify_password("fresh", &account.password));

        let outside = StudentChanges {
            school_id: Some(fx.metro.id),
            ..Default::default()
        };
        assert!(update(fx.store(), &fx.district_admin(), fx.alice.id, outside).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_the_account() {
        let fx = Fixture::seeded().await;
        delete(fx.store(), &fx.school_admin(), fx.alice.id).await.unwrap();
        assert!(fx.store().users().find_by_id(fx.alice.user_id).await.unwrap().is_none());
        assert!(delete(fx.store(), &fx.school_admin(), fx.bob.id).await.is_err());
    }
}
