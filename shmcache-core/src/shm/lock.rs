// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cross-process exclusive lock guarding a shared region.
//!
//! Uses `flock(2)` on a lock file named after the region. The kernel drops
//! the lock when the holder exits, so a crashed process cannot wedge the
//! cache. Locks belong to the open file description: two handles opened
//! separately exclude each other even inside one process.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::RegionError;

/// Held exclusive lock. Released on drop.
#[derive(Debug)]
pub struct RegionLock {
    file: File,
    path: PathBuf,
}

impl RegionLock {
    /// Block until the exclusive lock on `path` is held.
    ///
    /// The lock file and its parent directory are created when missing.
    pub fn acquire(path: &Path) -> Result<Self, RegionError> {
        let lock_failed = |source| RegionError::LockFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(lock_failed)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(path)
            .map_err(lock_failed)?;

        loop {
            // SAFETY: the descriptor stays open for the lifetime of `file`
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if result == 0 {
                break;
            }

            let errno = std::io::Error::last_os_error();
            if errno.kind() != std::io::ErrorKind::Interrupted {
                return Err(lock_failed(errno));
            }
        }

        tracing::trace!(path = %path.display(), "Acquired region lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        // Closing the file would release it too; unlock explicitly so the
        // failure shows up in the logs.
        // SAFETY: the descriptor is still open
        if unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) } < 0 {
            tracing::error!(
                path = %self.path.display(),
                error = %std::io::Error::last_os_error(),
                "Failed to release region lock"
            );
        }
    }
}
