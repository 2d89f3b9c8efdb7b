//! Compact 12-byte document identifier.
//!
//! Layout: 4-byte big-endian seconds timestamp, 5-byte per-process
//! nonce, 3-byte big-endian counter. Renders as 24 lowercase hex
//! characters.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Error;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_NONCE: OnceLock<[u8; 5]> = OnceLock::new();

fn process_nonce() -> [u8; 5] {
    *PROCESS_NONCE.get_or_init(|| {
        let seed = uuid::Uuid::new_v4();
        let bytes = seed.as_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
    })
}

/// 12-byte unique identifier with an embedded creation timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a fresh identifier from the clock, the process nonce,
    /// and a monotonic counter.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nonce = process_nonce();
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&nonce);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    /// Wraps raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    /// Raw byte view, used by the bytewise total order.
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Creation time embedded in the identifier, as Unix seconds.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidDataType(format!(
                "'{s}' is not a 24-hex-character objectid"
            )));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).expect("ascii hex");
            bytes[i] = u8::from_str_radix(hex, 16).expect("validated hex digit");
        }
        Ok(ObjectId(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_hex() {
        let id = ObjectId::new();
        let parsed: ObjectId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn fresh_ids_are_distinct_and_ordered_by_time() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert!(a.timestamp() <= b.timestamp());
    }

    #[test]
    fn rejects_malformed_input() {
        let err = "zz".parse::<ObjectId>().unwrap_err();
        assert_eq!(err.code(), "InvalidDataType");
    }
}
