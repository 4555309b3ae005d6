//! Identifier newtypes.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content-addressed identifier of a causal event.
///
/// An `EventId` is a BLAKE3 hash over the event's causal coordinates
/// (universe, store, sequence, timestamp, kind and parents). It renders as
/// hex in serialized form so exported histories stay readable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId([u8; 32]);

impl EventId {
    /// Hash arbitrary bytes into an `EventId`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string, with or without the `evt:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("evt:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.short_hex())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string without validation.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Caller-chosen identifier of a universe.
    UniverseId
);

string_id!(
    /// Key of a store, unique within its universe.
    StoreKey
);

string_id!(
    /// Identifier of a branch inside one causal store.
    BranchId
);

impl BranchId {
    /// The branch every store starts on.
    pub const MAIN: &'static str = "main";

    /// The genesis branch id.
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// A fresh time-ordered branch id (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns `true` for the genesis branch.
    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }
}

impl UniverseId {
    /// Id of a universe derived from this one (`{id}-{suffix}`).
    pub fn derived(&self, suffix: &str) -> Self {
        Self(format!("{}-{suffix}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn event_id_from_bytes_is_deterministic() {
        assert_eq!(EventId::from_bytes(b"a"), EventId::from_bytes(b"a"));
        assert_ne!(EventId::from_bytes(b"a"), EventId::from_bytes(b"b"));
    }

    #[test]
    fn event_id_hex_roundtrip_accepts_prefix() {
        let id = EventId::from_bytes(b"event");
        assert_eq!(EventId::from_hex(&id.to_hex()).unwrap(), id);
        let prefixed = format!("evt:{}", id.to_hex());
        assert_eq!(EventId::from_hex(&prefixed).unwrap(), id);
    }

    #[test]
    fn event_id_rejects_short_hex() {
        let err = EventId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn event_id_serializes_as_hex_string() {
        let id = EventId::from_hash([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(format!("{id}"), "evt:abababab");
    }

    #[test]
    fn string_ids_borrow_as_str_for_map_lookup() {
        let mut map = BTreeMap::new();
        map.insert(StoreKey::from("counter"), 1);
        assert_eq!(map.get("counter"), Some(&1));
    }

    #[test]
    fn branch_ids() {
        assert!(BranchId::main().is_main());
        let a = BranchId::generate();
        let b = BranchId::generate();
        assert_ne!(a, b);
        assert!(!a.is_main());
    }

    #[test]
    fn derived_universe_id() {
        let id = UniverseId::from("alpha");
        assert_eq!(id.derived("clone").as_str(), "alpha-clone");
    }

    #[test]
    fn string_id_serializes_transparently() {
        let key = StoreKey::from("energy");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"energy\"");
    }
}
