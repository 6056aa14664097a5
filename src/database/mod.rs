pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod query_builder;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Collection, Document, Store};

use std::sync::Arc;
use tracing::warn;

use crate::config::DatabaseConfig;

/// PostgreSQL when a URL is configured (schema applied), otherwise the
/// in-memory store.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    if config.url.is_none() {
        warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let pool = DatabaseManager::connect(config).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}
