use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::tenancy::Scope;
use super::visibility::{ListRequest, SchoolQuery};
use super::{required, Caller, ServiceError, ServiceResult};
use crate::database::models::School;
use crate::database::Store;
use crate::filter::{Field, Predicate};
use crate::types::Role;

const DUPLICATE_NAME: &str = "A school with this name already exists";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchoolInput {
    pub name: Option<String>,
    pub city: Option<String>,
}

async fn find_school(store: &dyn Store, id: Uuid) -> ServiceResult<School> {
    store
        .schools()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("School not found"))
}

pub async fn list(store: &dyn Store, caller: &Caller, query: SchoolQuery) -> ServiceResult<Vec<School>> {
    let scope = Scope::resolve(store, caller).await?;
    let predicate = ListRequest::Schools(query).filter(store, caller, &scope).await?;
    Ok(store.schools().list(&predicate).await?)
}

pub async fn get(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<School> {
    let school = find_school(store, id).await?;
    Scope::resolve(store, caller).await?.authorize(school.id)?;
    Ok(school)
}

pub async fn create(store: &dyn Store, caller: &Caller, input: SchoolInput) -> ServiceResult<School> {
    caller.require_role(&[Role::MainAdmin])?;
    let name = required(input.name.as_deref(), "School name")?;
    let city = required(input.city.as_deref(), "City")?;
    let school = store
        .schools()
        .insert(School::new(name, city))
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_NAME))?;
    info!(school = %school.id, name = %school.name, "school created");
    Ok(school)
}

pub async fn update(store: &dyn Store, caller: &Caller, id: Uuid, input: SchoolInput) -> ServiceResult<School> {
    caller.require_role(&[Role::MainAdmin])?;
    let mut school = find_school(store, id).await?;
    if input.name.is_some() {
        school.name = required(input.name.as_deref(), "School name")?;
    }
    if input.city.is_some() {
        school.city = required(input.city.as_deref(), "City")?;
    }
    store
        .schools()
        .update(school)
        .await
        .map_err(ServiceError::conflict_on_duplicate(DUPLICATE_NAME))?
        .ok_or_else(|| ServiceError::not_found("School not found"))
}

/// Removes the school only. Accounts, students and events that point at it
/// are left in place.
pub async fn delete(store: &dyn Store, caller: &Caller, id: Uuid) -> ServiceResult<()> {
    caller.require_role(&[Role::MainAdmin])?;
    let school = find_school(store, id).await?;
    store.schools().delete(&Predicate::eq(Field::Id, school.id)).await?;

    let dependents = store.users().count(&Predicate::eq(Field::SchoolId, school.id)).await?
        + store.students().count(&Predicate::eq(Field::SchoolId, school.id)).await?
        + store.events().count(&Predicate::eq(Field::SchoolId, school.id)).await?;
    if dependents > 0 {
        warn!(school = %school.id, dependents, "deleted school still referenced");
    }
    info!(school = %school.id, "school deleted");
    Ok(())
}

/// Moves the school into the district administrator's city.
pub async fn assign_district(store: &dyn Store, caller: &Caller, id: Uuid, district_admin_id: Uuid) -> ServiceResult<School> {
    caller.require_role(&[Role::MainAdmin])?;
    let mut school = find_school(store, id).await?;
    let admin = store
        .users()
        .find_by_id(district_admin_id)
        .await?
        .filter(|user| user.role == Role::DistrictAdmin)
        .ok_or_else(|| ServiceError::validation("Invalid district admin"))?;
    school.city = admin
        .city
        .ok_or_else(|| ServiceError::validation("District admin has no city"))?;
    info!(school = %school.id, city = %school.city, "school assigned to district");
    store
        .schools()
        .update(school)
        .await?
        .ok_or_else(|| ServiceError::not_found("School not found"))
}

/// Distinct non-empty cities, sorted.
pub async fn cities(store: &dyn Store, caller: &Caller) -> ServiceResult<Vec<String>> {
    caller.require_role(&[Role::MainAdmin])?;
    let cities: BTreeSet<String> = store
        .schools()
        .find(&Predicate::All)
        .await?
        .into_iter()
        .map(|school| school.city)
        .filter(|city| !city.trim().is_empty())
        .collect();
    Ok(cities.into_iter().collect())
}
