//! Asset identification
//!
//! An asset is either the ledger's native asset or an issued credit asset
//! identified by a short code and the issuer's account address. Two assets
//! compare equal iff both are native, or both are credit with identical
//! code and issuer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::ledger::keys::AccountId;

/// Tag discriminating the native ledger asset from an issued credit asset.
///
/// The string form is self-describing so wire messages are self-contained:
/// `native`, or `CODE:ISSUER` with the issuer in the account-id string
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Asset {
    /// The ledger's native asset
    Native,
    /// An issued credit asset
    Credit {
        /// Short asset code assigned by the issuer
        code: String,
        /// Account address of the issuer
        issuer: AccountId,
    },
}

impl Asset {
    /// Returns true for the native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// Writes the asset's canonical byte encoding for transaction hashing.
    pub(crate) fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Asset::Native => out.push(0),
            Asset::Credit { code, issuer } => {
                out.push(1);
                out.extend_from_slice(&(code.len() as u32).to_be_bytes());
                out.extend_from_slice(code.as_bytes());
                out.extend_from_slice(issuer.as_bytes());
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

impl FromStr for Asset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "native" {
            return Ok(Asset::Native);
        }
        let (code, issuer) = s.split_once(':').ok_or_else(|| ParseError::UnknownAsset(s.into()))?;
        if code.is_empty() || code.len() > 12 {
            return Err(ParseError::UnknownAsset(s.into()));
        }
        Ok(Asset::Credit { code: code.to_string(), issuer: issuer.parse()? })
    }
}

impl From<Asset> for String {
    fn from(a: Asset) -> Self {
        a.to_string()
    }
}

impl TryFrom<String> for Asset {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
