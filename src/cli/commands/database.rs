use anyhow::Context;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{open_store, DatabaseManager};
use crate::seed::seed_demo_data;

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config().database)
        .await
        .context("connecting to PostgreSQL (is DATABASE_URL set?)")?;
    DatabaseManager::migrate(&pool).await.context("applying schema")?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "migrated": true })),
        OutputFormat::Text => println!("Schema is up to date"),
    }
    Ok(())
}

pub async fn seed(output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&config().database).await.context("opening store")?;
    let report = seed_demo_data(store.as_ref()).await.context("seeding demo data")?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "created": report.created })),
        OutputFormat::Text if report.created.is_empty() => println!("Demo data already present"),
        OutputFormat::Text => {
            for item in &report.created {
                println!("created {}", item);
            }
        }
    }
    Ok(())
}
