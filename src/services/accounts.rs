//! Login, registration and the caller's own record.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::tenancy::Scope;
use super::users::DUPLICATE_EMAIL;
use super::{required, Caller, ServiceError, ServiceResult};
use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::database::models::User;
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// When present the account must hold this role.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Role,
    pub name: Option<String>,
    pub city: Option<String>,
    pub school_id: Option<Uuid>,
}

pub async fn login(store: &dyn Store, request: LoginRequest) -> ServiceResult<LoginResponse> {
    let rejected = || ServiceError::Unauthenticated("Invalid credentials".to_string());
    let email = request.email.trim();
    let user = store
        .users()
        .find_one(&Predicate::eq(Field::Email, email))
        .await?
        .ok_or_else(rejected)?;
    if !verify_password(&request.password, &user.password) {
        warn!(user = %user.id, "login with wrong password");
        return Err(rejected());
    }
    if request.role.is_some_and(|role| role != user.role) {
        warn!(user = %user.id, "login with mismatched role");
        return Err(rejected());
    }

    let token = generate_jwt(&Claims::for_user(&user)).map_err(|err| {
        warn!("token issue failed: {}", err);
        ServiceError::Unauthenticated("Could not issue token".to_string())
    })?;
    info!(user = %user.id, role = %user.role, "login");
    Ok(LoginResponse {
        token,
        role: user.role,
        school_id: user.school_id,
        city: user.city,
    })
}

/// Who may create which account: main admins anything, school admins
/// school-bound roles in their own school, district admins school-bound
/// roles in schools of their city.
pub async fn register(store: &dyn Store, caller: &Caller, request: RegisterRequest) -> ServiceResult<User> {
    caller.require_role(&[Role::MainAdmin, Role::SchoolAdmin, Role::DistrictAdmin])?;
    if caller.role != Role::MainAdmin && matches!(request.role, Role::MainAdmin | Role::DistrictAdmin) {
        warn!(user = %caller.user_id, role = %request.role, "administrator creation refused");
        return Err(ServiceError::access_denied("Access denied"));
    }

    let email = required(request.email.as_deref(), "Email")?;
    let password = required(request.password.as_deref(), "Password")?;
    let mut user = User::new(email, hash_password(&password), request.role);

    if request.role.requires_name() {
        user.name = Some(required(request.name.as_deref(), "Name")?);
    } else if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        user.name = Some(name.to_string());
    }
    if request.role == Role::DistrictAdmin {
        user.city = Some(required(request.city.as_deref(), "City")?);
    }
    if request.role.is_single_school() {
        let school_id = request
            .school_id
            .ok_or_else(|| ServiceError::validation("School ID required for this role"))?;
        Scope::resolve(store, caller).await?.authorize(school_id)?;
        if store.schools().find_by_id(school_id).await?.is_none() {
            return Err(ServiceError::validation("School not found"));
        }
        user.school_id = Some(school_id);
    }

    let user = store
        .users()
        .insert(user)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_EMAIL))?;
    info!(user = %user.id, role = %user.role, by = %caller.user_id, "account registered");
    Ok(user)
}

pub async fn me(store: &dyn Store, caller: &Caller) -> ServiceResult<User> {
    store
        .users()
        .find_by_id(caller.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_jwt;
    use crate::testing::{Fixture, PASSWORD};

    fn login_as(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            role: None,
        }
    }

    fn register_request(role: Role, school_id: Option<Uuid>) -> RegisterRequest {
        RegisterRequest {
            email: Some(format!("{}@new.test", role)),
            password: Some("pw".to_string()),
            role,
            name: Some("New Person".to_string()),
            city: None,
            school_id,
        }
    }

    #[tokio::test]
    async fn login_issues_scoped_token() {
        let fx = Fixture::seeded().await;
        let response = login(fx.store(), login_as("teacher@north.test", PASSWORD)).await.unwrap();
        assert_eq!(response.role, Role::Teacher);
        assert_eq!(response.school_id, Some(fx.north.id));
        let claims = validate_jwt(&response.token).unwrap();
        assert_eq!(claims.sub, fx.teacher.id);
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthenticated() {
        let fx = Fixture::seeded().await;
        assert!(matches!(
            login(fx.store(), login_as("teacher@north.test", "wrong")).await,
            Err(ServiceError::Unauthenticated(_))
        ));
        assert!(matches!(
            login(fx.store(), login_as("nobody@north.test", PASSWORD)).await,
            Err(ServiceError::Unauthenticated(_))
        ));
        let mut wrong_role = login_as("teacher@north.test", PASSWORD);
        wrong_role.role = Some(Role::Parent);
        assert!(login(fx.store(), wrong_role).await.is_err());
    }

    #[tokio::test]
    async fn school_admin_registers_into_own_school_only() {
        let fx = Fixture::seeded().await;
        let user = register(fx.store(), &fx.school_admin(), register_request(Role::Teacher, Some(fx.north.id)))
            .await
            .unwrap();
        assert_eq!(user.school_id, Some(fx.north.id));
        assert!(matches!(
            register(fx.store(), &fx.school_admin(), register_request(Role::Parent, Some(fx.south.id))).await,
            Err(ServiceError::AccessDenied(_))
        ));
        assert!(matches!(
            register(fx.store(), &fx.school_admin(), register_request(Role::DistrictAdmin, None)).await,
            Err(ServiceError::AccessDenied(_))
        ));
        assert!(register(fx.store(), &fx.teacher(), register_request(Role::Parent, Some(fx.north.id))).await.is_err());
    }

    #[tokio::test]
    async fn district_admin_registers_within_city() {
        let fx = Fixture::seeded().await;
        assert!(register(fx.store(), &fx.district_admin(), register_request(Role::SchoolAdmin, Some(fx.south.id)))
            .await
            .is_ok());
        assert!(register(fx.store(), &fx.district_admin(), register_request(Role::SchoolAdmin, Some(fx.metro.id)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn per_role_field_rules() {
        let fx = Fixture::seeded().await;
        let mut nameless = register_request(Role::Teacher, Some(fx.north.id));
        nameless.name = None;
        assert!(matches!(
            register(fx.store(), &fx.main_admin(), nameless).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            register(fx.store(), &fx.main_admin(), register_request(Role::DistrictAdmin, None)).await,
            Err(ServiceError::Validation(_))
        ));
        let mut district = register_request(Role::DistrictAdmin, None);
        district.city = Some("Metropolis".to_string());
        let created = register(fx.store(), &fx.main_admin(), district).await.unwrap();
        assert_eq!(created.city.as_deref(), Some("Metropolis"));
        assert!(matches!(
            register(fx.store(), &fx.main_admin(), register_request(Role::Teacher, None)).await,
            Err(ServiceError::Validation(_))
        ));
        let mut taken = register_request(Role::Teacher, Some(fx.north.id));
        taken.email = Some(fx.teacher.email.clone());
        assert!(matches!(
            register(fx.store(), &fx.main_admin(), taken).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn me_returns_own_record() {
        let fx = Fixture::seeded().await;
        assert_eq!(me(fx.store(), &fx.parent()).await.unwrap().id, fx.parent.id);
    }
}
