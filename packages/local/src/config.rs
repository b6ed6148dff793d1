//! Local transport configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{Address, AddressError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid root address: {0}")]
    InvalidRoot(#[from] AddressError),
}

/// Settings for a [`LocalTransport`](crate::LocalTransport).
///
/// ```json
/// { "name": "player", "root": "/org/example" }
/// ```
///
/// Missing fields take their defaults: name `local`, root `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalConfig {
    /// Name used in log lines.
    pub name: String,
    /// Address prefix for every node published on this transport.
    pub root: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            root: "/".to_string(),
        }
    }
}

impl LocalConfig {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LocalConfig = serde_json::from_str(json)?;
        config.root_address()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The validated root address.
    pub fn root_address(&self) -> Result<Address, ConfigError> {
        Ok(Address::parse(&self.root)?)
    }
}
