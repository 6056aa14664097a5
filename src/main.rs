use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use school_attendance::config::config;
use school_attendance::database::open_store;
use school_attendance::seed::seed_demo_data;
use school_attendance::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config();
    info!("Starting School Attendance API in {:?} mode", config.environment);

    if school_attendance::is_production!() && config.database.url.is_none() {
        anyhow::bail!("DATABASE_URL is required in production");
    }

    let store = open_store(&config.database).await.context("opening store")?;
    if config.server.seed_demo_data {
        seed_demo_data(store.as_ref()).await.context("seeding demo data")?;
    }

    let app = router(AppState::new(store));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("School Attendance API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}
