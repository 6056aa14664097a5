//! Demo accounts and school created at startup when `SEED_DEMO_DATA` is set.

use tracing::info;

use crate::auth::hash_password;
use crate::database::models::{School, User};
use crate::database::{DatabaseError, Store};
use crate::filter::{Field, Predicate};
use crate::types::Role;

pub const MAIN_ADMIN_EMAIL: &str = "admin@education.gov";
pub const MAIN_ADMIN_PASSWORD: &str = "admin123";
pub const DISTRICT_ADMIN_EMAIL: &str = "district@education.gov";
pub const DISTRICT_ADMIN_PASSWORD: &str = "district123";
pub const DEFAULT_SCHOOL: &str = "Default School";

#[derive(Debug, Default, PartialEq)]
pub struct SeedReport {
    pub created: Vec<String>,
}

/// Creates whatever part of the demo data is missing. Safe to rerun.
pub async fn seed_demo_data(store: &dyn Store) -> Result<SeedReport, DatabaseError> {
    let mut report = SeedReport::default();

    let main = User::new(MAIN_ADMIN_EMAIL, hash_password(MAIN_ADMIN_PASSWORD), Role::MainAdmin);
    if ensure_user(store, main).await? {
        report.created.push(MAIN_ADMIN_EMAIL.to_string());
    }

    let district = User::new(DISTRICT_ADMIN_EMAIL, hash_password(DISTRICT_ADMIN_PASSWORD), Role::DistrictAdmin)
        .with_city("Demo City")
        .with_name("Demo District Admin");
    if ensure_user(store, district).await? {
        report.created.push(DISTRICT_ADMIN_EMAIL.to_string());
    }

    let existing = store
        .schools()
        .find_one(&Predicate::eq(Field::Name, DEFAULT_SCHOOL))
        .await?;
    if existing.is_none() {
        store.schools().insert(School::new(DEFAULT_SCHOOL, "Default City")).await?;
        report.created.push(DEFAULT_SCHOOL.to_string());
    }

    info!(created = ?report.created, "demo data seeded");
    Ok(report)
}

async fn ensure_user(store: &dyn Store, user: User) -> Result<bool, DatabaseError> {
    let existing = store.users().find_one(&Predicate::eq(Field::Email, &user.email)).await?;
    if existing.is_some() {
        return Ok(false);
    }
    store.users().insert(user).await?;
    Ok(true)
}
