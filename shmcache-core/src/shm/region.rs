// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedRegion - POSIX shared memory wrapper.
//!
//! Provides safe, bounds-checked byte-range access over `shm_open` + `mmap`.
//! All unsafe operations are encapsulated here. A handle is meant to live for
//! a single cache operation: dropping it unmaps the memory and closes the
//! descriptor, but never unlinks the region, which outlives every process.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::config::{MAX_CAPACITY, MIN_CAPACITY};
use crate::error::RegionError;

/// A mapped view of a named shared memory region.
pub struct SharedRegion {
    /// Name of the shared memory object (without the leading '/').
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
}

// SAFETY: SharedRegion owns its mapping and every access goes through
// bounds-checked copies; callers serialize access with RegionLock.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Open the region called `name`, creating it with `size` bytes if it does
    /// not exist yet.
    ///
    /// A freshly created region is zero-filled by the OS, which reads back as
    /// an empty frame. An existing region must have exactly `size` bytes:
    /// the capacity is fixed at creation and never grows.
    pub fn open_or_create(name: &str, size: usize) -> Result<Self, RegionError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&size) {
            return Err(RegionError::CreateFailed {
                name: name.to_string(),
                reason: format!(
                    "Size {} outside {}..={} bytes",
                    size, MIN_CAPACITY, MAX_CAPACITY
                ),
            });
        }

        if name.is_empty() {
            return Err(RegionError::CreateFailed {
                name: name.to_string(),
                reason: "Name cannot be empty".to_string(),
            });
        }

        let c_name = shm_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let mut fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        let mut created = true;

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() != Some(libc::EEXIST) {
                return Err(RegionError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("shm_open failed: {}", errno),
                });
            }

            // SAFETY: c_name is a valid CString
            fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
            created = false;

            if fd < 0 {
                return Err(RegionError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
                });
            }
        }

        let actual = match object_size(fd) {
            Ok(actual) => actual,
            Err(errno) => {
                close_fd(fd);
                return Err(RegionError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("fstat failed: {}", errno),
                });
            }
        };

        // A creator that died between shm_open and ftruncate leaves a
        // zero-length object behind; size it here as if we had created it.
        if created || actual == 0 {
            // SAFETY: fd is a valid file descriptor
            let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
            if result < 0 {
                let errno = std::io::Error::last_os_error();
                close_fd(fd);
                if created {
                    // SAFETY: c_name is a valid CString
                    unsafe { libc::shm_unlink(c_name.as_ptr()) };
                }
                return Err(RegionError::CreateFailed {
                    name: name.to_string(),
                    reason: format!("ftruncate failed: {}", errno),
                });
            }
        } else if actual != size {
            close_fd(fd);
            return Err(RegionError::SizeMismatch {
                name: name.to_string(),
                expected: size,
                actual,
            });
        }

        // SAFETY: fd is valid and sized to at least `size` bytes
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            close_fd(fd);
            return Err(RegionError::MapFailed {
                reason: format!("mmap failed: {}", errno),
            });
        }

        let Some(ptr) = NonNull::new(ptr as *mut u8) else {
            close_fd(fd);
            return Err(RegionError::MapFailed {
                reason: "mmap returned null".to_string(),
            });
        };

        tracing::debug!(name = %name, size = size, created = created, "Opened shared memory region");

        Ok(Self {
            name: name.to_string(),
            ptr,
            size,
            fd,
        })
    }

    /// Remove the region name from the system.
    ///
    /// Processes that still have it mapped keep their view; the next
    /// `open_or_create` starts from a fresh, zeroed region. Returns `false`
    /// if no region with that name existed.
    pub fn unlink(name: &str) -> Result<bool, RegionError> {
        let c_name = shm_name(name)?;

        // SAFETY: c_name is a valid CString
        let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Ok(false);
            }
            return Err(RegionError::UnlinkFailed {
                name: name.to_string(),
                reason: errno.to_string(),
            });
        }

        tracing::debug!(name = %name, "Unlinked shared memory region");
        Ok(true)
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `len` bytes starting at `offset` out of the region.
    pub fn read_range(&self, offset: usize, len: usize) -> Result<Vec<u8>, RegionError> {
        self.check_range(offset, len)?;

        let mut buf = vec![0u8; len];
        // SAFETY: offset..offset+len was checked against the mapping size
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), buf.as_mut_ptr(), len);
        }
        Ok(buf)
    }

    /// Copy `bytes` into the region starting at `offset`.
    pub fn write_range(&mut self, offset: usize, bytes: &[u8]) -> Result<(), RegionError> {
        self.check_range(offset, bytes.len())?;

        // SAFETY: offset..offset+len was checked against the mapping size
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.ptr.as_ptr().add(offset),
                bytes.len(),
            );
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), RegionError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(RegionError::OutOfBounds {
                offset,
                len,
                size: self.size,
            }),
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during mapping
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        close_fd(self.fd);
    }
}

fn shm_name(name: &str) -> Result<CString, RegionError> {
    CString::new(format!("/{}", name)).map_err(|e| RegionError::CreateFailed {
        name: name.to_string(),
        reason: format!("Invalid name: {}", e),
    })
}

fn object_size(fd: i32) -> Result<usize, std::io::Error> {
    // SAFETY: stat is plain old data, fully written by fstat on success
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: fd is a valid file descriptor, stat is a valid out pointer
    if unsafe { libc::fstat(fd, &mut stat) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(stat.st_size as usize)
}

fn close_fd(fd: i32) {
    // SAFETY: fd was returned by shm_open and is closed exactly once
    if unsafe { libc::close(fd) } < 0 {
        tracing::error!(
            fd = fd,
            error = %std::io::Error::last_os_error(),
            "Failed to close shared memory descriptor"
        );
    }
}
