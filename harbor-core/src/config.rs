//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::ConfigError;

/// Which store implementation backs the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on exit
    Memory,
    /// LMDB environment on disk
    Lmdb,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "lmdb" => Ok(StoreBackend::Lmdb),
            _ => Err(ConfigError::InvalidValue {
                field: "HARBOR_STORE_BACKEND".to_string(),
                value: s.to_string(),
                reason: "expected 'memory' or 'lmdb'".to_string(),
            }),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding the LMDB files. Required for `Lmdb`.
    pub path: Option<PathBuf>,
    /// LMDB map size in megabytes.
    pub max_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            max_size_mb: 64,
        }
    }
}

impl StoreConfig {
    /// Load from environment variables.
    ///
    /// - `HARBOR_STORE_BACKEND`: "memory" or "lmdb" (default: memory)
    /// - `HARBOR_STORE_PATH`: LMDB directory
    /// - `HARBOR_LMDB_MAX_SIZE_MB`: map size (default: 64)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match std::env::var("HARBOR_STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.backend,
        };
        let path = std::env::var("HARBOR_STORE_PATH").ok().map(PathBuf::from);
        let max_size_mb = match std::env::var("HARBOR_LMDB_MAX_SIZE_MB") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "HARBOR_LMDB_MAX_SIZE_MB".to_string(),
                value: value.clone(),
                reason: "expected a positive integer".to_string(),
            })?,
            Err(_) => defaults.max_size_mb,
        };

        let config = Self {
            backend,
            path,
            max_size_mb,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StoreBackend::Lmdb && self.path.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "HARBOR_STORE_PATH".to_string(),
            });
        }
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "HARBOR_LMDB_MAX_SIZE_MB".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.map_size_bytes()?;
        Ok(())
    }

    /// LMDB map size in bytes.
    pub fn map_size_bytes(&self) -> Result<usize, ConfigError> {
        self.max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "HARBOR_LMDB_MAX_SIZE_MB".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "map size overflows usize".to_string(),
            })
    }
}
