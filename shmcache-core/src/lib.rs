//! shmcache Core Library
//!
//! Expiring key-value cache stored in a single named POSIX shared memory
//! region, shared by every process on the host that opens the same name.
//! There is no cache server: each process reads and writes the region
//! directly.
//!
//! ```no_run
//! use std::time::Duration;
//! use shmcache_core::{CacheConfig, CacheStore};
//!
//! let store: CacheStore<String> = CacheStore::new(CacheConfig::new("sessions"))?;
//! store.set("user:42", "alice".to_string(), Duration::from_secs(300))?;
//! assert_eq!(store.get("user:42")?, Some("alice".to_string()));
//! # Ok::<(), shmcache_core::CacheError>(())
//! ```
//!
//! # Cost model
//!
//! Every operation decodes and re-encodes the whole map under an exclusive
//! lock, so each call costs O(serialized map size). The design targets maps
//! of at most a few thousand entries and about 1 MiB serialized; beyond
//! that, lock hold times grow with every entry added. Expired entries keep
//! using capacity until a `get` touches them or `remove_expired` runs.
//!
//! # Concurrency
//!
//! Operations are serialized by an in-process mutex and by an `flock(2)`
//! on `<lock_dir>/.<region_name>.lock`, so concurrent writers in different
//! processes never lose updates. The exclusion only holds between processes
//! that agree on `lock_dir`. The default, [`config::DEFAULT_LOCK_DIR`]
//! (`/dev/shm` on Linux), is fixed and does not follow `TMPDIR`; an
//! explicit `lock_dir` must be the same in every participant. Eviction is
//! time-based only; there is no size bound other than the region capacity.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod shm;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CacheEntry, CacheMap, JsonCodec, MapCodec, MessagePackCodec};
pub use config::{CacheConfig, ConfigLoader, DEFAULT_CAPACITY};
pub use error::{CacheError, CacheResult, CodecError, ConfigError, RegionError};
pub use store::{CacheStore, MAX_TTL};
