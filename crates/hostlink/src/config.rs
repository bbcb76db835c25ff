//! Bridge configuration
//!
//! Stored as JSON. Every field has a default, so a partial file (or no
//! file at all) yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HostLinkError, Result};
use crate::types::ExecutionMode;

fn default_transaction_name() -> String {
    "Delete orphaned elements".to_string()
}

/// Configuration for a [`crate::HostBridge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Whether deletions run immediately or wait for host idle time
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Override the host's perspective-view automation capability
    #[serde(default)]
    pub perspective_automation: Option<bool>,
    /// Ask the host to close when the bridge shuts down
    #[serde(default)]
    pub close_host_on_shutdown: bool,
    /// Name of the host transaction used for orphan deletion
    #[serde(default = "default_transaction_name")]
    pub deletion_transaction_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::default(),
            perspective_automation: None,
            close_host_on_shutdown: false,
            deletion_transaction_name: default_transaction_name(),
        }
    }
}

impl BridgeConfig {
    /// Configuration for automated test runs
    pub fn automated() -> Self {
        Self {
            execution_mode: ExecutionMode::Automated,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HostLinkError::Config(e.to_string()))
    }

    /// Load a configuration file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        log::info!("Loaded bridge config from {:?}", path);
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
