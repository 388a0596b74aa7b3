//! Configuration management.

/// Database configuration and connection management
pub mod database;

/// Privileged-role allow-list loaded from config.toml
pub mod roles;

use crate::errors::Result;
use roles::RoleConfig;
use tracing::info;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,
    /// Role-to-tier mapping
    pub roles: RoleConfig,
}

/// Loads the application configuration from the environment and, when
/// present, `config.toml`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let database_url = database::get_database_url();
    let roles = RoleConfig::load_default()?;
    info!(
        privileged_roles = ?roles.privileged,
        "application configuration loaded"
    );
    Ok(AppConfig {
        database_url,
        roles,
    })
}
