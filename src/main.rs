//! Service bootstrap for the ledger core.
//!
//! Initializes tracing, configuration, and the database, then exposes the
//! ledger handle. Route/UI layers embed the library; this binary only wires
//! the core up and verifies it is ready.

use dotenvy::dotenv;
use messmate::config;
use messmate::core::Ledger;
use messmate::errors::Result;
use messmate::gate::StaticGate;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok();

    let app_config = config::load_app_configuration()?;
    info!(database_url = %app_config.database_url, "configuration loaded");

    let db = config::database::create_connection().await?;
    config::database::create_tables(&db).await?;
    info!("database initialized");

    let _ledger = Ledger::new(db, Arc::new(StaticGate::new())).with_roles(app_config.roles);
    info!("ledger core ready");

    Ok(())
}
