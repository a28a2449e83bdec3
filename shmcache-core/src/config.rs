// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cache configuration with strict validation.
//!
//! A configuration names the shared region and fixes its capacity. It is
//! validated before the region is ever touched; an invalid value is a
//! [`ConfigError`] and the store refuses to start.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Default region capacity: 10 MiB.
pub const DEFAULT_CAPACITY: usize = 10 * 1024 * 1024;
/// Smallest accepted region (one page).
pub const MIN_CAPACITY: usize = 4096;
/// Largest accepted region (1 GiB).
pub const MAX_CAPACITY: usize = 1024 * 1024 * 1024;

/// Default directory for lock files.
///
/// Fixed rather than taken from the environment: processes with a different
/// `TMPDIR` must still lock the same file for the same region. On Linux this
/// is where the shm objects themselves live.
#[cfg(target_os = "linux")]
pub const DEFAULT_LOCK_DIR: &str = "/dev/shm";
#[cfg(not(target_os = "linux"))]
pub const DEFAULT_LOCK_DIR: &str = "/tmp";

const MAX_NAME_LEN: usize = 200;

/// Raw configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawCacheConfig {
    region_name: String,
    #[serde(default = "default_capacity")]
    capacity_bytes: usize,
    #[serde(default)]
    lock_dir: Option<String>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_lock_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOCK_DIR)
}

/// Configuration of a single cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Well-known name of the shared region, shared by every participating process.
    pub region_name: String,
    /// Fixed size of the region in bytes, including the 8-byte frame header.
    pub capacity_bytes: usize,
    /// Directory holding the `.<region_name>.lock` file used for cross-process
    /// locking. Every process sharing the region must use the same directory.
    pub lock_dir: PathBuf,
}

impl CacheConfig {
    /// Configuration with the default capacity and lock directory.
    pub fn new(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            capacity_bytes: DEFAULT_CAPACITY,
            lock_dir: default_lock_dir(),
        }
    }

    pub fn with_capacity(mut self, capacity_bytes: usize) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = lock_dir.into();
        self
    }

    /// Path of the advisory lock file guarding the region.
    ///
    /// Region names never start with '.', so the lock file cannot be
    /// mistaken for a region when both live in `/dev/shm`.
    pub fn lock_path(&self) -> PathBuf {
        self.lock_dir.join(format!(".{}.lock", self.region_name))
    }

    /// Check every field. Called by the store at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.region_name;

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "region_name",
                value: name.clone(),
                reason: "Region name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ConfigError::InvalidFieldValue {
                field: "region_name",
                value: name.clone(),
                reason: format!(
                    "Region name too long: {} chars (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        // Becomes both "/<name>" for shm_open and a file name in lock_dir
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "region_name",
                value: name.clone(),
                reason: "Region name must contain only ASCII alphanumerics, '-', '_' and '.'"
                    .to_string(),
            });
        }

        if name.starts_with('.') {
            return Err(ConfigError::InvalidFieldValue {
                field: "region_name",
                value: name.clone(),
                reason: "Region name cannot start with '.'".to_string(),
            });
        }

        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.capacity_bytes) {
            return Err(ConfigError::InvalidFieldValue {
                field: "capacity_bytes",
                value: self.capacity_bytes.to_string(),
                reason: format!(
                    "Must be between {} and {} bytes",
                    MIN_CAPACITY, MAX_CAPACITY
                ),
            });
        }

        if self.lock_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidFieldValue {
                field: "lock_dir",
                value: String::new(),
                reason: "Lock directory cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Loads a [`CacheConfig`] from YAML for applications that keep it in a file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<CacheConfig, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> Result<CacheConfig, ConfigError> {
        let raw: RawCacheConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            message: format!("YAML parse error: {}", e),
        })?;

        let config = CacheConfig {
            region_name: raw.region_name,
            capacity_bytes: raw.capacity_bytes,
            lock_dir: raw.lock_dir.map(PathBuf::from).unwrap_or_else(default_lock_dir),
        };
        config.validate()?;

        Ok(config)
    }
}
