//! Ownership record and its stored encoding.
//!
//! Records are stored as compact CBOR maps with short keys:
//!
//! ```text
//! { "id": <owner id>, "raw": <raw name>, "end": <expiration ms>? }
//! ```
//!
//! `end` is omitted for claims that never expire.

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The persisted owner of one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    /// Opaque owner identifier, compared for equality only.
    #[serde(rename = "id")]
    pub owner_id: String,

    /// The name as submitted, before canonicalization.
    #[serde(rename = "raw")]
    pub raw_name: String,

    /// Milliseconds since the Unix epoch at which the claim lapses.
    #[serde(rename = "end", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl OwnershipRecord {
    /// Creates a record.
    pub fn new(
        owner_id: impl Into<String>,
        raw_name: impl Into<String>,
        expires_at: Option<u64>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            raw_name: raw_name.into(),
            expires_at,
        }
    }

    /// Returns true if `owner_id` holds this record.
    #[must_use]
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    /// Returns true if the claim has lapsed at `now_millis`.
    ///
    /// A claim with an expiration lapses once the expiration is reached; a
    /// claim without one never lapses.
    #[must_use]
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        matches!(self.expires_at, Some(end) if end <= now_millis)
    }

    /// Returns the time left on the claim, or `None` for permanent claims.
    #[must_use]
    pub fn remaining_at(&self, now_millis: u64) -> Option<Duration> {
        self.expires_at
            .map(|end| Duration::from_millis(end.saturating_sub(now_millis)))
    }

    /// Encodes the record for storage.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Encode`] if serialization fails.
    pub fn encode(&self) -> RegistryResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| RegistryError::encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Decode`] if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> RegistryResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| RegistryError::decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_is_inclusive() {
        let record = OwnershipRecord::new("user1", "djMax", Some(1_000));
        assert!(!record.is_expired_at(999));
        assert!(record.is_expired_at(1_000));
        assert!(record.is_expired_at(1_001));
    }

    #[test]
    fn permanent_record_never_expires() {
        let record = OwnershipRecord::new("user1", "djMax", None);
        assert!(!record.is_expired_at(u64::MAX));
        assert_eq!(record.remaining_at(0), None);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let record = OwnershipRecord::new("user1", "djMax", Some(1_000));
        assert_eq!(record.remaining_at(400), Some(Duration::from_millis(600)));
        assert_eq!(record.remaining_at(5_000), Some(Duration::ZERO));
    }

    #[test]
    fn encoded_record_round_trips() {
        let record = OwnershipRecord::new("user1", "djMax", Some(1_700_000_000_000));
        let decoded = OwnershipRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn missing_expiration_is_omitted() {
        let permanent = OwnershipRecord::new("u", "n", None).encode().unwrap();
        let timed = OwnershipRecord::new("u", "n", Some(5)).encode().unwrap();
        // map(2) vs map(3)
        assert_eq!(permanent[0], 0xa2);
        assert_eq!(timed[0], 0xa3);
        assert_eq!(
            OwnershipRecord::decode(&permanent).unwrap().expires_at,
            None
        );
    }

    #[test]
    fn garbage_is_a_decode_error() {
        for bytes in [&b"not a record"[..], &[0xff][..], &[0x18, 0x2a][..], &[][..]] {
            assert!(matches!(
                OwnershipRecord::decode(bytes),
                Err(RegistryError::Decode { .. })
            ));
        }
    }

    #[test]
    fn record_missing_owner_is_rejected() {
        let mut buf = Vec::new();
        ciborium::into_writer(
            &std::collections::BTreeMap::from([("raw", "djMax")]),
            &mut buf,
        )
        .unwrap();
        assert!(OwnershipRecord::decode(&buf).is_err());
    }
}
