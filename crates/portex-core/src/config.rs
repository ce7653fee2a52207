//! Service configuration: serde structs for the expansion service's JSON config.
//!
//! Pure types and loading only; the CLI layers flag overrides on top.

use crate::error::{Error, Result};
use crate::types::urns;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "PORTEX_CONFIG";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind: BindMode,
    /// Environment URN stamped on every primitive leaf.
    pub environment: String,
    /// Largest accepted request body, in bytes.
    pub max_request_bytes: usize,
}

fn default_port() -> u16 {
    8097
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
            environment: urns::ENV_EMBEDDED.to_string(),
            max_request_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Bind mode for the HTTP binding
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lan" | "0.0.0.0" => BindMode::Lan,
            _ => BindMode::Loopback,
        }
    }
}

impl ServiceConfig {
    /// Load from a specific path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidRequest(format!("bad config {}: {}", path.display(), e)))
    }

    /// Load from `$PORTEX_CONFIG` if set, otherwise defaults.
    pub fn discover() -> Result<Self> {
        match Self::env_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn env_path() -> Option<PathBuf> {
        std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind.to_addr(), self.port)
    }
}
