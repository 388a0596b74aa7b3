//! Privileged-role allow-list.
//!
//! The membership service reports roles as free-form strings. The allow-list
//! below is the single place those strings are mapped to a privilege tier,
//! so call sites never drift apart on which roles count as privileged.

use crate::errors::{Error, Result};
use crate::gate::PrivilegeTier;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Default allow-list used when no config file is present.
const DEFAULT_PRIVILEGED_ROLES: &[&str] = &["admin", "manager", "owner"];

/// Role-to-tier mapping loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Role strings granted the privileged tier (case-insensitive)
    #[serde(default)]
    pub privileged: Vec<String>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            privileged: DEFAULT_PRIVILEGED_ROLES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Shape of the `[roles]` section in config.toml.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    roles: Option<RoleConfig>,
}

impl RoleConfig {
    /// Loads the role configuration from `config.toml` in the working
    /// directory, falling back to the built-in defaults when the file does
    /// not exist.
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Loads the role configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "no config file; using default role allow-list");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let parsed: ConfigFile = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;
        Ok(parsed.roles.unwrap_or_default())
    }

    /// Maps a raw role string to its privilege tier.
    #[must_use]
    pub fn tier_for(&self, role: &str) -> PrivilegeTier {
        if self
            .privileged
            .iter()
            .any(|r| r.eq_ignore_ascii_case(role))
        {
            PrivilegeTier::Privileged
        } else {
            PrivilegeTier::Member
        }
    }
}
