//! Which schools a caller may act on.

use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

use super::{Caller, ServiceError, ServiceResult};
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// main_admin.
    Unrestricted,
    /// Roles bound to a single school.
    School(Uuid),
    /// district_admin: every school whose city equals the admin's city at
    /// the time of the request. May be empty, never unrestricted.
    District { city: String, schools: BTreeSet<Uuid> },
}

impl Scope {
    /// Computes the scope from live store state. Never cached.
    pub async fn resolve(store: &dyn Store, caller: &Caller) -> ServiceResult<Scope> {
        match caller.role {
            Role::MainAdmin => Ok(Scope::Unrestricted),
            Role::DistrictAdmin => {
                let city = caller
                    .city
                    .clone()
                    .ok_or_else(|| ServiceError::access_denied("District administrator has no city"))?;
                let schools: BTreeSet<Uuid> = store
                    .schools()
                    .find(&Predicate::eq(Field::City, &city))
                    .await?
                    .into_iter()
                    .map(|school| school.id)
                    .collect();
                debug!(user = %caller.user_id, %city, schools = schools.len(), "resolved district scope");
                Ok(Scope::District { city, schools })
            }
            _ => caller
                .school_id
                .map(Scope::School)
                .ok_or_else(|| ServiceError::access_denied("Account is not attached to a school")),
        }
    }

    pub fn contains(&self, school_id: Uuid) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::School(id) => *id == school_id,
            Scope::District { schools, .. } => schools.contains(&school_id),
        }
    }

    /// Restriction over a column holding a school id.
    pub fn predicate_on(&self, field: Field) -> Predicate {
        match self {
            Scope::Unrestricted => Predicate::All,
            Scope::School(id) => Predicate::eq(field, id),
            Scope::District { schools, .. } => Predicate::is_in(field, schools.iter()),
        }
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate_on(Field::SchoolId)
    }

    /// Scope predicate with an optional single-school override. The
    /// override must lie inside the scope.
    pub fn narrow(&self, requested: Option<Uuid>) -> ServiceResult<Predicate> {
        match requested {
            None => Ok(self.predicate()),
            Some(id) if self.contains(id) => Ok(Predicate::eq(Field::SchoolId, id)),
            Some(id) => {
                debug!(school = %id, "school filter outside scope");
                Err(ServiceError::access_denied("Access denied: School not in your scope"))
            }
        }
    }

    pub fn authorize(&self, school_id: Uuid) -> ServiceResult<()> {
        if self.contains(school_id) {
            Ok(())
        } else {
            Err(ServiceError::access_denied("Access denied"))
        }
    }
}
