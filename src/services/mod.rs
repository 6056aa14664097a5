pub mod accounts;
pub mod analytics;
pub mod events;
pub mod ledger;
pub mod naming;
pub mod schools;
pub mod students;
pub mod tenancy;
pub mod users;
pub mod visibility;

use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;
use crate::types::Role;

/// Identity presented by the token. Trusted verbatim: a stale token keeps
/// its school and city until it is re-issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub city: Option<String>,
}

impl Caller {
    pub fn require_staff(&self) -> ServiceResult<()> {
        self.require(self.role.is_staff())
    }

    pub fn require_admin(&self) -> ServiceResult<()> {
        self.require(self.role.is_admin())
    }

    pub fn require_role(&self, roles: &[Role]) -> ServiceResult<()> {
        self.require(roles.contains(&self.role))
    }

    fn require(&self, allowed: bool) -> ServiceResult<()> {
        if allowed {
            Ok(())
        } else {
            tracing::warn!(user = %self.user_id, role = %self.role, "role not permitted");
            Err(ServiceError::AccessDenied("Access denied".to_string()))
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        ServiceError::AccessDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Turn a unique-constraint clash into a `Conflict` carrying `message`.
    pub fn conflict_on_duplicate(message: &str) -> impl Fn(DatabaseError) -> ServiceError + '_ {
        move |err| match err {
            DatabaseError::Duplicate { .. } => ServiceError::Conflict(message.to_string()),
            other => ServiceError::Database(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trimmed value of a required text field, or a validation error.
pub(crate) fn required(value: Option<&str>, field: &str) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::validation(format!("{} is required", field))),
    }
}
