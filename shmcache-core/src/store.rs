// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CacheStore - expiring key-value cache over a shared region.
//!
//! Every operation runs the same critical section:
//!
//! 1. take the in-process mutex, then the cross-process region lock;
//! 2. open (or create) the region;
//! 3. decode the whole map;
//! 4. apply the operation in memory;
//! 5. if the map changed, encode the whole map and write it back.
//!
//! Cost is therefore linear in the serialized size of the map, not in the
//! size of the touched entry. See the crate docs for the intended ceiling.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::codec::{CacheEntry, CacheMap, MapCodec, MessagePackCodec};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, RegionError};
use crate::shm::{FrameCodec, RegionLock, SharedRegion};

/// Longest honored time-to-live (100 years). Longer TTLs are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Result of applying an operation to the in-memory map.
struct Mutation<R> {
    result: R,
    write_back: bool,
}

impl<R> Mutation<R> {
    fn unchanged(result: R) -> Self {
        Self {
            result,
            write_back: false,
        }
    }

    fn changed(result: R) -> Self {
        Self {
            result,
            write_back: true,
        }
    }
}

/// Expiring cache of `T` values shared by every process that opens the
/// same region name.
///
/// Stores are independent values: several may coexist with different
/// regions, capacities or codecs. Two stores opened on the same region must
/// agree on the capacity and codec.
pub struct CacheStore<T, C = MessagePackCodec> {
    config: CacheConfig,
    codec: C,
    frame: FrameCodec,
    clock: Arc<dyn Clock>,
    /// Serializes operations issued through this store within the process.
    local: Mutex<()>,
    _value: PhantomData<fn() -> T>,
}

impl<T> CacheStore<T, MessagePackCodec>
where
    T: Serialize + DeserializeOwned,
{
    /// Store using the default MessagePack codec and the system clock.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::with_codec(config, MessagePackCodec)
    }
}

impl<T, C> CacheStore<T, C>
where
    C: MapCodec<T>,
{
    /// Store using `codec` for the map payload.
    ///
    /// Validates the configuration; the region itself is opened lazily by
    /// the first operation.
    pub fn with_codec(config: CacheConfig, codec: C) -> CacheResult<Self> {
        config.validate()?;

        Ok(Self {
            frame: FrameCodec::new(config.capacity_bytes),
            config,
            codec,
            clock: Arc::new(SystemClock),
            local: Mutex::new(()),
            _value: PhantomData,
        })
    }

    /// Replace the time source used for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert or overwrite `key`, visible until `ttl` has elapsed.
    ///
    /// Fails with `CapacityExceeded` if the resulting map does not fit; the
    /// region keeps its previous contents in that case.
    pub fn set(&self, key: &str, value: T, ttl: Duration) -> CacheResult<()> {
        self.transact(|map, now| {
            let entry = CacheEntry::new(value, expiry(now, ttl));
            map.insert(key.to_string(), entry);
            Mutation::changed(())
        })
    }

    /// Look up a live value.
    ///
    /// An expired entry is a miss and is also removed from the region, so a
    /// `get` may write.
    pub fn get(&self, key: &str) -> CacheResult<Option<T>> {
        self.transact(|map, now| match map.remove(key) {
            None => Mutation::unchanged(None),
            Some(entry) if entry.is_expired(now) => {
                tracing::debug!(key = %key, "Purging expired entry on read");
                Mutation::changed(None)
            }
            // The map is dropped without write-back, so taking the entry
            // out of it does not remove it from the region.
            Some(entry) => Mutation::unchanged(Some(entry.into_value())),
        })
    }

    /// Remove `key`. Returns whether it was present.
    ///
    /// Presence is physical: an expired entry not yet purged still counts.
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        self.transact(|map, _| match map.remove(key) {
            Some(_) => Mutation::changed(true),
            None => Mutation::unchanged(false),
        })
    }

    /// Sweep every expired entry. Returns how many were removed.
    ///
    /// The map is written back even when nothing expired. Meant to be called
    /// periodically by the embedding application; without it, expired
    /// entries occupy capacity until a `get` touches them.
    pub fn remove_expired(&self) -> CacheResult<usize> {
        self.transact(|map, now| {
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired(now));
            let removed = before - map.len();

            if removed > 0 {
                tracing::debug!(
                    removed = removed,
                    remaining = map.len(),
                    "Swept expired entries"
                );
            }
            Mutation::changed(removed)
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> CacheResult<usize> {
        self.transact(|map, now| {
            Mutation::unchanged(map.values().filter(|e| !e.is_expired(now)).count())
        })
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The map exactly as stored, expired entries included.
    pub fn snapshot(&self) -> CacheResult<CacheMap<T>> {
        self.transact(|map, _| Mutation::unchanged(std::mem::take(map)))
    }

    /// Drop every entry, expired or not.
    pub fn clear(&self) -> CacheResult<()> {
        self.transact(|map, _| {
            map.clear();
            Mutation::changed(())
        })
    }

    /// Unlink the region from the system. Returns `false` if it did not exist.
    ///
    /// Processes in the middle of an operation finish against the old
    /// region; the next operation anywhere starts from an empty one. The
    /// lock file is kept so that waiters and newcomers still share it.
    pub fn destroy(&self) -> CacheResult<bool> {
        let _local = self.local.lock();
        let _lock = self.lock_region()?;

        let existed = SharedRegion::unlink(&self.config.region_name)
            .map_err(|source| self.unavailable(source))?;

        tracing::debug!(name = %self.config.region_name, existed = existed, "Destroyed cache region");
        Ok(existed)
    }

    /// Run `op` against the current map inside both locks.
    fn transact<R>(
        &self,
        op: impl FnOnce(&mut CacheMap<T>, DateTime<Utc>) -> Mutation<R>,
    ) -> CacheResult<R> {
        let _local = self.local.lock();
        let _lock = self.lock_region()?;

        let mut region =
            SharedRegion::open_or_create(&self.config.region_name, self.config.capacity_bytes)
                .map_err(|source| self.unavailable(source))?;

        let mut map = self.load(&region)?;
        let now = self.clock.now();

        let Mutation { result, write_back } = op(&mut map, now);
        if write_back {
            self.save(&mut region, &map)?;
        }

        Ok(result)
    }

    fn lock_region(&self) -> CacheResult<RegionLock> {
        RegionLock::acquire(&self.config.lock_path()).map_err(|source| self.unavailable(source))
    }

    /// Decode the stored map. Undecodable payloads are logged and read as
    /// an empty map.
    fn load(&self, region: &SharedRegion) -> CacheResult<CacheMap<T>> {
        let payload = self.frame.read(region)?;
        if payload.is_empty() {
            return Ok(CacheMap::new());
        }

        match self.codec.deserialize(&payload) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    name = %self.config.region_name,
                    payload_len = payload.len(),
                    error = %e,
                    "Discarding undecodable cache payload"
                );
                Ok(CacheMap::new())
            }
        }
    }

    /// Encode and write back the map. An empty map is written as an empty
    /// frame (`L == 0`) whatever the codec would produce for it.
    fn save(&self, region: &mut SharedRegion, map: &CacheMap<T>) -> CacheResult<()> {
        if map.is_empty() {
            return self.frame.write(region, &[]);
        }

        let payload = self.codec.serialize(map).map_err(CacheError::Encode)?;
        self.frame.write(region, &payload)
    }

    fn unavailable(&self, source: RegionError) -> CacheError {
        CacheError::RegionUnavailable {
            name: self.config.region_name.clone(),
            source,
        }
    }
}

/// `now + ttl`, with `ttl` clamped to [`MAX_TTL`].
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = ttl.min(MAX_TTL);
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
