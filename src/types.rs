//! Core type definitions for the escrow-channel library
//!
//! This module defines fundamental types used across multiple modules,
//! providing a common location for shared type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;

// ============================================================================
// Fundamental Types
// ============================================================================

/// Type alias for 32-byte arrays used across cryptographic operations
pub type Bytes32 = [u8; 32];

/// Domain separation tag for transaction hashing
///
/// Mixed into every transaction hash together with the network id so that
/// signatures over transactions can never collide with signatures over any
/// other payload.
pub const TX_DOMAIN_TAG: &[u8] = b"ESC_TX_v1";

// ============================================================================
// Transaction Hashes
// ============================================================================

/// Opaque 32-byte transaction hash computed from the canonical transaction
/// encoding plus a network passphrase.
///
/// Hashes serve as the *identity* of an agreement's transactions: a rebuilt
/// transaction's hash must match the hash carried in an agreement envelope
/// before any signature over it is trusted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TransactionHash(pub Bytes32);

impl TransactionHash {
    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &Bytes32 {
        &self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionHash({})", self)
    }
}

impl FromStr for TransactionHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ParseError::InvalidHexDigit)?;
        let bytes: Bytes32 = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ParseError::InvalidLength { expected: 32, got: v.len() })?;
        Ok(TransactionHash(bytes))
    }
}

impl From<TransactionHash> for String {
    fn from(h: TransactionHash) -> Self {
        h.to_string()
    }
}

impl TryFrom<String> for TransactionHash {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_hash_display_parse() {
        let hash = TransactionHash([7u8; 32]);
        let s = hash.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<TransactionHash>().unwrap(), hash);

        assert!(matches!(
            "0707".parse::<TransactionHash>(),
            Err(ParseError::InvalidLength { expected: 32, got: 2 })
        ));
        assert!(matches!(
            "zz".parse::<TransactionHash>(),
            Err(ParseError::InvalidHexDigit)
        ));
    }

    #[test]
    fn test_transaction_hash_serde_round_trip() {
        let hash = TransactionHash([7u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: TransactionHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
