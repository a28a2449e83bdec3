// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Length-prefixed framing of the cache payload inside the region.
//!
//! ```text
//! offset 0..8          : u64 little-endian, L = payload length
//! offset 8..8+L        : payload
//! offset 8+L..capacity : stale bytes, ignored
//! ```
//!
//! `L == 0` is an empty cache. `L > capacity - 8` can only come from a torn
//! or foreign write and is read back as empty too.

use crate::error::{CacheError, CacheResult, RegionError};
use crate::shm::SharedRegion;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 8;

/// Encodes and decodes frames for a region of fixed capacity.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    capacity: usize,
}

impl FrameCodec {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Largest payload a frame can carry.
    pub fn max_payload(&self) -> usize {
        self.capacity.saturating_sub(HEADER_LEN)
    }

    /// Build the frame bytes for `payload`.
    ///
    /// Fails with `CapacityExceeded` instead of truncating.
    pub fn encode(&self, payload: &[u8]) -> CacheResult<Vec<u8>> {
        if payload.len() > self.max_payload() {
            return Err(CacheError::CapacityExceeded {
                size: payload.len(),
                max: self.max_payload(),
            });
        }

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        frame.extend_from_slice(payload);
        Ok(frame)
    }

    /// Extract the payload from a full copy of the region.
    ///
    /// Never fails: empty or corrupt frames yield an empty slice.
    pub fn decode<'a>(&self, region: &'a [u8]) -> &'a [u8] {
        let Some(header) = region.get(..HEADER_LEN) else {
            return &[];
        };
        match self.payload_len(header) {
            Some(len) => region.get(HEADER_LEN..HEADER_LEN + len).unwrap_or(&[]),
            None => &[],
        }
    }

    /// Read the current payload out of `region`.
    ///
    /// Only the header and the `L` payload bytes are copied, never the
    /// whole region.
    pub fn read(&self, region: &SharedRegion) -> Result<Vec<u8>, RegionError> {
        let header = region.read_range(0, HEADER_LEN)?;
        match self.payload_len(&header) {
            Some(len) => region.read_range(HEADER_LEN, len),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the frame in `region` with one carrying `payload`.
    ///
    /// The size check happens before any byte is written, so an oversized
    /// payload leaves the previous contents intact.
    pub fn write(&self, region: &mut SharedRegion, payload: &[u8]) -> CacheResult<()> {
        let frame = self.encode(payload)?;
        region.write_range(0, &frame)?;

        tracing::debug!(
            name = %region.name(),
            payload_len = payload.len(),
            "Wrote cache frame"
        );
        Ok(())
    }

    /// Validated payload length, or `None` for an empty or corrupt header.
    fn payload_len(&self, header: &[u8]) -> Option<usize> {
        let bytes: [u8; HEADER_LEN] = header.try_into().ok()?;
        let len = u64::from_le_bytes(bytes);

        if len == 0 {
            return None;
        }

        if len > self.max_payload() as u64 {
            tracing::warn!(
                len = len,
                max = self.max_payload(),
                "Frame length exceeds region capacity, treating region as empty"
            );
            return None;
        }

        Some(len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let codec = FrameCodec::new(64);
        let frame = codec.encode(b"abc").unwrap();

        assert_eq!(&frame[..8], &3u64.to_le_bytes());
        assert_eq!(&frame[8..], b"abc");
        assert_eq!(codec.decode(&frame), b"abc");
    }

    #[test]
    fn test_encode_capacity_exceeded() {
        let codec = FrameCodec::new(16);
        assert!(codec.encode(&[1u8; 8]).is_ok());
        assert!(matches!(
            codec.encode(&[1u8; 9]),
            Err(CacheError::CapacityExceeded { size: 9, max: 8 })
        ));
    }

    #[test]
    fn test_decode_ignores_stale_tail() {
        let codec = FrameCodec::new(32);
        let mut region = vec![0xEEu8; 32];
        region[..8].copy_from_slice(&2u64.to_le_bytes());
        region[8] = 1;
        region[9] = 2;

        assert_eq!(codec.decode(&region), &[1, 2]);
    }

    #[test]
    fn test_decode_empty_and_corrupt() {
        let codec = FrameCodec::new(32);

        assert!(codec.decode(&[0u8; 32]).is_empty());
        assert!(codec.decode(&[0u8; 4]).is_empty());

        let mut region = vec![0u8; 32];
        region[..8].copy_from_slice(&25u64.to_le_bytes());
        assert!(codec.decode(&region).is_empty());

        region[..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(codec.decode(&region).is_empty());
    }

    #[test]
    fn test_decode_truncated_copy() {
        // Header claims more than the slice we were handed
        let codec = FrameCodec::new(1024);
        let mut region = vec![0u8; 16];
        region[..8].copy_from_slice(&100u64.to_le_bytes());
        assert!(codec.decode(&region).is_empty());
    }
}
