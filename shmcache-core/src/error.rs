// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmcache.
//!
//! Errors are explicit enums, no `Box<dyn Error>` and no `anyhow::Result`.
//! They fall into three tiers:
//!
//! * recovered: a payload that fails to decode is treated as an empty map
//!   by the store and only logged ([`CodecError::Decode`] never reaches callers
//!   of the cache operations);
//! * surfaced: [`CacheError::CapacityExceeded`] and [`CacheError::Io`] abort
//!   the current operation and are returned to the caller;
//! * fatal: [`CacheError::RegionUnavailable`] means the shared region or its
//!   lock could not be acquired at all.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type returned by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    // =========================================================================
    // Fatal - the region cannot be reached
    // =========================================================================
    #[error("Shared region '{name}' unavailable: {source}")]
    RegionUnavailable {
        name: String,
        #[source]
        source: RegionError,
    },

    // =========================================================================
    // Surfaced - operation aborted, region left as it was
    // =========================================================================
    #[error("Serialized cache map does not fit the region: {size} > {max} bytes")]
    CapacityExceeded { size: usize, max: usize },

    #[error("Failed to encode cache map: {0}")]
    Encode(#[source] CodecError),

    #[error("Region I/O failed: {0}")]
    Io(#[from] RegionError),

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Low-level failures of the shared memory accessor and its lock.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("Failed to create or open shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Region {name} has size {actual}, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Range {offset}..{offset}+{len} is outside region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Failed to lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to unlink shared memory region {name}: {reason}")]
    UnlinkFailed { name: String, reason: String },
}

/// Map serialization errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {reason}")]
    Encode { reason: String },

    #[error("decode failed: {reason}")]
    Decode { reason: String },
}

/// Configuration errors, raised before any region is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using CacheError.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_display() {
        let err = CacheError::CapacityExceeded {
            size: 5000,
            max: 4088,
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("4088"));
    }

    #[test]
    fn test_error_chain() {
        let region_err = RegionError::OutOfBounds {
            offset: 10,
            len: 8,
            size: 12,
        };
        let cache_err: CacheError = region_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));

        let config_err = ConfigError::Parse {
            message: "bad".to_string(),
        };
        let cache_err: CacheError = config_err.into();
        assert!(matches!(cache_err, CacheError::Config(_)));
    }
}
