//! Account addresses and signer identities
//!
//! Participants are identified by ed25519 verifying keys; escrow accounts
//! by opaque 32-byte on-ledger addresses. Both carry self-describing string
//! encodings for wire messages.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::types::Bytes32;

/// Opaque 32-byte address of an on-ledger account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccountId(Bytes32);

impl AccountId {
    /// Creates an account id from raw bytes.
    pub fn from_bytes(bytes: Bytes32) -> Self {
        AccountId(bytes)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &Bytes32 {
        &self.0
    }
}

impl From<&VerifyingKey> for AccountId {
    fn from(key: &VerifyingKey) -> Self {
        AccountId(key.to_bytes())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl FromStr for AccountId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ParseError::InvalidHexDigit)?;
        let bytes: Bytes32 = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ParseError::InvalidLength { expected: 32, got: v.len() })?;
        Ok(AccountId(bytes))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AccountId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Returns the 4-byte signature hint for a signer key.
///
/// The hint is the trailing four bytes of the key, enough for a verifier to
/// pick candidate signatures out of a transaction's attached set without
/// trying every key.
pub fn signer_hint(key: &VerifyingKey) -> [u8; 4] {
    let bytes = key.to_bytes();
    [bytes[28], bytes[29], bytes[30], bytes[31]]
}

/// Serde adapter serializing a [`VerifyingKey`] as a hex string.
pub(crate) mod signer_hex {
    use ed25519_dalek::VerifyingKey;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::errors::ParseError;

    pub fn serialize<S: Serializer>(key: &VerifyingKey, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(key.to_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VerifyingKey, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| de::Error::custom(ParseError::InvalidPublicKey))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| de::Error::custom(ParseError::InvalidPublicKey))
    }
}

/// Serde adapter serializing an ed25519 [`Signature`](ed25519_dalek::Signature)
/// as a hex string.
pub(crate) mod signature_hex {
    use ed25519_dalek::Signature;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::errors::ParseError;

    pub fn serialize<S: Serializer>(sig: &Signature, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(sig.to_bytes()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Signature, D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            de::Error::custom(ParseError::InvalidLength { expected: 64, got: v.len() })
        })?;
        Ok(Signature::from_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use super::*;

    #[test]
    fn test_account_id_round_trip() {
        let id = AccountId::from_bytes([3u8; 32]);
        assert_eq!(id.to_string().parse::<AccountId>().unwrap(), id);

        assert!(matches!(
            "0303".parse::<AccountId>(),
            Err(ParseError::InvalidLength { expected: 32, got: 2 })
        ));
    }

    #[test]
    fn test_signer_hint_is_key_suffix() {
        let key = SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let hint = signer_hint(&key);
        assert_eq!(hint, key.to_bytes()[28..32]);
    }
}
