// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixtures for the shmcache benchmarks.
//!
//! Every operation rewrites the whole map, so benchmarks are parameterized
//! by how many entries the region already holds.

use std::time::Duration;

use shmcache_core::shm::SharedRegion;
use shmcache_core::{CacheConfig, CacheResult, CacheStore, ConfigError};
use tempfile::TempDir;

/// Map sizes (entry counts) to benchmark against.
pub const MAP_SIZES: &[usize] = &[10, 100, 1_000, 2_500];

/// Region large enough for the biggest map size.
pub const BENCH_CAPACITY: usize = 16 * 1024 * 1024;

/// A store on a private region, unlinked on drop.
pub struct BenchRegion {
    pub store: CacheStore<Vec<u8>>,
    name: String,
    _lock_dir: TempDir,
}

impl BenchRegion {
    pub fn new(tag: &str) -> CacheResult<Self> {
        let lock_dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            context: "creating benchmark lock dir",
            source,
        })?;
        let name = format!("shmcache-bench-{}-{}", tag, std::process::id());
        let _ = SharedRegion::unlink(&name);

        let config = CacheConfig::new(name.clone())
            .with_capacity(BENCH_CAPACITY)
            .with_lock_dir(lock_dir.path());

        Ok(Self {
            store: CacheStore::new(config)?,
            name,
            _lock_dir: lock_dir,
        })
    }

    /// Fill the store with `entries` live values of `value_len` bytes.
    pub fn populate(&self, entries: usize, value_len: usize) -> CacheResult<()> {
        for i in 0..entries {
            self.store
                .set(&entry_key(i), vec![0xAB; value_len], Duration::from_secs(3600))?;
        }
        Ok(())
    }
}

impl Drop for BenchRegion {
    fn drop(&mut self) {
        let _ = SharedRegion::unlink(&self.name);
    }
}

pub fn entry_key(i: usize) -> String {
    format!("entry:{:08}", i)
}
