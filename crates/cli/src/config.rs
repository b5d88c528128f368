//! Configuration file format for `planta`.
//!
//! Read from `--config <path>`, or `planta.toml` in the working directory
//! when present. Every section is optional; environment variables override
//! file values for secrets and limits.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! rate_limit = 120
//! api_key = "change-me"
//!
//! [store]
//! backend = "airtable"
//! base_id = "appXXXXXXXXXXXXXX"
//! token = "patXXXXXXXX"
//! timeout_secs = 15
//!
//! [access]
//! privileged_roles = ["Jefe director de planta", "CTO"]
//!
//! [[equipment]]
//! id = "motor-1"
//! name = "Motor 1"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "planta.toml";

pub(crate) const DEFAULT_PORT: u16 = 8080;

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlantaConfig {
    #[serde(default)]
    pub(crate) server: ServerConfig,
    #[serde(default)]
    pub(crate) store: StoreConfig,
    #[serde(default)]
    pub(crate) access: AccessConfig,
    /// Equipment rows seeded into the memory backend at startup.
    #[serde(default)]
    pub(crate) equipment: Vec<EquipmentSeed>,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
    /// Requests per minute per client IP.
    pub(crate) rate_limit: u64,
    /// When set, every endpoint except `/health` requires this key.
    pub(crate) api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Backend {
    /// In-process tables, lost on exit.
    #[default]
    Memory,
    Airtable,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreConfig {
    pub(crate) backend: Backend,
    pub(crate) base_url: Option<String>,
    pub(crate) base_id: Option<String>,
    pub(crate) token: Option<String>,
    /// Per-request deadline for the HTTP backend.
    pub(crate) timeout_secs: Option<u64>,
}

/// `[access]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AccessConfig {
    /// Role labels allowed to act outside their own shift. `None` keeps the
    /// built-in list.
    pub(crate) privileged_roles: Option<Vec<String>>,
}

/// One `[[equipment]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EquipmentSeed {
    pub(crate) id: String,
    pub(crate) name: String,
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolve which file to read: the explicit path, else `planta.toml` if it
/// exists, else none.
pub(crate) fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.is_file().then_some(default)
        }
    }
}

/// Read and parse a config file. Returns a human-readable error string.
pub(crate) fn read_config(path: &Path) -> Result<PlantaConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Load the effective configuration: file (if any), then environment.
pub(crate) fn load(explicit: Option<&Path>) -> Result<PlantaConfig, String> {
    let mut config = match resolve_path(explicit) {
        Some(path) => read_config(&path)?,
        None => PlantaConfig::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Override file values from the environment. Empty values are ignored.
pub(crate) fn apply_env(
    config: &mut PlantaConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), String> {
    let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = var("PLANTA_API_KEY") {
        config.server.api_key = Some(key);
    }
    if let Some(limit) = var("PLANTA_RATE_LIMIT") {
        config.server.rate_limit = limit
            .trim()
            .parse()
            .map_err(|_| format!("PLANTA_RATE_LIMIT must be a positive integer, got '{}'", limit))?;
    }
    if let Some(base_id) = var("AIRTABLE_BASE_ID") {
        config.store.base_id = Some(base_id);
    }
    if let Some(token) = var("AIRTABLE_TOKEN") {
        config.store.token = Some(token);
    }
    Ok(())
}
