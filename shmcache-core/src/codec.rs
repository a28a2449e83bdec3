// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cache entries and the serialization of the whole cache map.
//!
//! The map is the unit of storage: every operation decodes all of it and
//! encodes all of it again. Codecs are pluggable so a store can pick the
//! trade-off between compactness and readability of the region contents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// A cached value and the instant it stops being visible.
///
/// Entries are never mutated in place; an update replaces the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// An entry is expired from its expiry instant onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Entire logical state of one cache.
pub type CacheMap<T> = HashMap<String, CacheEntry<T>>;

/// Converts a [`CacheMap`] to and from the frame payload.
pub trait MapCodec<T>: Send + Sync {
    fn serialize(&self, map: &CacheMap<T>) -> Result<Vec<u8>, CodecError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<CacheMap<T>, CodecError>;
}

/// MessagePack with named fields.
///
/// Struct fields are written as keyed maps, so values stored by an older
/// build decode as long as new fields carry `#[serde(default)]`, and unknown
/// fields are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePackCodec;

impl<T> MapCodec<T> for MessagePackCodec
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, map: &CacheMap<T>) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(map).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CacheMap<T>, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }
}

/// Plain JSON. Larger, but a dump of the region is human-readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<T> MapCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, map: &CacheMap<T>) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(map).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<CacheMap<T>, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeDelta;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct SessionV1 {
        user: String,
        hits: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct SessionV2 {
        user: String,
        hits: u32,
        #[serde(default)]
        locale: Option<String>,
    }

    fn sample_map() -> CacheMap<SessionV1> {
        let now = Utc::now();
        let mut map = CacheMap::new();
        map.insert(
            "alice".to_string(),
            CacheEntry::new(
                SessionV1 {
                    user: "alice".to_string(),
                    hits: 3,
                },
                now + TimeDelta::hours(1),
            ),
        );
        map.insert(
            "bob".to_string(),
            CacheEntry::new(
                SessionV1 {
                    user: "bob".to_string(),
                    hits: 0,
                },
                now - TimeDelta::seconds(5),
            ),
        );
        map
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        assert!(CacheEntry::new(1, now).is_expired(now));
        assert!(!CacheEntry::new(1, now + TimeDelta::milliseconds(1)).is_expired(now));
    }

    #[test]
    fn test_messagepack_roundtrip() {
        let map = sample_map();
        let bytes = MessagePackCodec.serialize(&map).unwrap();
        let decoded: CacheMap<SessionV1> = MessagePackCodec.deserialize(&bytes).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_json_roundtrip() {
        let map = sample_map();
        let bytes = JsonCodec.serialize(&map).unwrap();
        let decoded: CacheMap<SessionV1> = JsonCodec.deserialize(&bytes).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_messagepack_forward_compatible() {
        let map = sample_map();
        let bytes = MessagePackCodec.serialize(&map).unwrap();

        // Old payload, new shape: the added field defaults
        let upgraded: CacheMap<SessionV2> = MessagePackCodec.deserialize(&bytes).unwrap();
        assert_eq!(upgraded["alice"].value().hits, 3);
        assert_eq!(upgraded["alice"].value().locale, None);

        // New payload, old shape: the unknown field is skipped
        let bytes = MessagePackCodec.serialize(&upgraded).unwrap();
        let downgraded: CacheMap<SessionV1> = MessagePackCodec.deserialize(&bytes).unwrap();
        assert_eq!(downgraded, map);
    }

    #[test]
    fn test_malformed_bytes() {
        let result: Result<CacheMap<SessionV1>, _> =
            MessagePackCodec.deserialize(&[0xc1, 0xff, 0x00]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));

        let result: Result<CacheMap<SessionV1>, _> = JsonCodec.deserialize(b"{not json");
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let mut map: CacheMap<String> = CacheMap::new();
        map.insert(
            "k".to_string(),
            CacheEntry::new("text".to_string(), Utc::now()),
        );
        let bytes = MessagePackCodec.serialize(&map).unwrap();

        let result: Result<CacheMap<u64>, _> = MessagePackCodec.deserialize(&bytes);
        assert!(result.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_messagepack_roundtrip(
            entries in prop::collection::hash_map(
                "[a-z0-9:_-]{1,24}",
                (any::<i64>(), -86_400i64..86_400_000),
                0..32,
            )
        ) {
            let now = Utc::now();
            let map: CacheMap<i64> = entries
                .into_iter()
                .map(|(key, (value, offset_ms))| {
                    (key, CacheEntry::new(value, now + TimeDelta::milliseconds(offset_ms)))
                })
                .collect();

            let bytes = MessagePackCodec.serialize(&map).unwrap();
            let decoded: CacheMap<i64> = MessagePackCodec.deserialize(&bytes).unwrap();
            prop_assert_eq!(decoded, map);
        }
    }
}
