//! Observed transaction results and ledger-entry metadata
//!
//! Ingestion consumes transactions together with the result and result
//! metadata the caller observed on the ledger. The metadata is a flat list
//! of updated ledger entries; the channel walks it to validate formation
//! and to refresh its escrow balance caches.

use ed25519_dalek::VerifyingKey;

use crate::ledger::asset::Asset;
use crate::ledger::keys::AccountId;

/// Account threshold configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Weight of the account's master key
    pub master_weight: u32,
    /// Threshold for low-security operations
    pub low: u32,
    /// Threshold for medium-security operations
    pub medium: u32,
    /// Threshold for high-security operations
    pub high: u32,
}

/// Outcome of an observed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResult {
    /// Whether the transaction executed successfully
    pub successful: bool,
}

/// Post-execution state of an account entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    /// Account address
    pub address: AccountId,
    /// Account sequence number after the transaction
    pub sequence: i64,
    /// Native-asset balance after the transaction
    pub balance: i64,
    /// Threshold configuration after the transaction
    pub thresholds: Thresholds,
    /// Signers and their weights after the transaction
    pub signers: Vec<(VerifyingKey, u32)>,
}

/// Post-execution state of a trustline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustlineEntry {
    /// Account holding the trustline
    pub account: AccountId,
    /// Asset trusted
    pub asset: Asset,
    /// Trustline balance after the transaction
    pub balance: i64,
}

/// A single updated ledger entry from a transaction's result metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntryUpdate {
    /// An account entry was updated
    Account(AccountEntry),
    /// A trustline entry was updated
    Trustline(TrustlineEntry),
}

/// Result metadata of an observed transaction: the ledger entries it
/// updated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionResultMeta {
    /// Updated ledger entries, in execution order
    pub updates: Vec<LedgerEntryUpdate>,
}
