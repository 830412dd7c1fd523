// crates/basis-core/src/identity.rs
//
// Account and contract identities, and the per-call execution context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::BasisError;

/// A 20-byte account or contract address.
///
/// Serialized as a `0x`-prefixed lowercase hex string so it can key JSON maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid operator or recipient.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Derive a deterministic address from a human-readable label.
    ///
    /// Takes the first 20 bytes of SHA-256(label). Used to name contracts and
    /// simulated actors ("treasury", "alice", ...).
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Address(bytes)
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps tracing output readable.
        write!(f, "0x{}..", &self.to_hex()[..8])
    }
}

impl FromStr for Address {
    type Err = BasisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 40 {
            return Err(BasisError::InvalidState(format!(
                "Address must be 40 hex characters, got {}",
                digits.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| {
            BasisError::InvalidState(format!("Invalid address hex '{}': {}", s, e))
        })?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Execution context of a single call.
///
/// `origin` is the actor that started the transaction; `caller` is the
/// immediate caller, which becomes the calling contract's address when one
/// component calls into another (see [`CallContext::forward`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Immediate caller.
    pub caller: Address,
    /// Transaction originator.
    pub origin: Address,
    /// Height of the block the call executes in.
    pub block_number: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

impl CallContext {
    /// A top-level call made directly by `origin`.
    pub fn new(origin: Address, block_number: u64, timestamp: u64) -> Self {
        Self {
            caller: origin,
            origin,
            block_number,
            timestamp,
        }
    }

    /// The context seen by a callee when `caller` (a contract) calls it.
    pub fn forward(&self, caller: Address) -> Self {
        Self { caller, ..*self }
    }
}
