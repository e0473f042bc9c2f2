//! Formation transaction builder
//!
//! The one-time transaction that converts two ordinary accounts into the
//! channel's escrow configuration: both participants' signers installed at
//! weight 1 on both accounts, thresholds requiring joint signatures for any
//! movement of funds, and trustlines for a credit-asset channel.

use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::VerifyingKey;

use crate::errors::TxBuildError;
use crate::ledger::{Asset, AccountId, Operation, SignerUpdate, Thresholds, Transaction};

/// Threshold configuration every escrow account must reach at formation.
pub const ESCROW_THRESHOLDS: Thresholds =
    Thresholds { master_weight: 2, low: 0, medium: 2, high: 2 };

/// Parameters for building a formation transaction.
#[derive(Debug, Clone)]
pub struct FormationParams {
    /// Initiator participant's signer key
    pub initiator_signer: VerifyingKey,
    /// Responder participant's signer key
    pub responder_signer: VerifyingKey,
    /// Initiator's escrow account
    pub initiator_escrow: AccountId,
    /// Responder's escrow account
    pub responder_escrow: AccountId,
    /// Initiator-escrow sequence the transaction is valid at
    pub starting_sequence: i64,
    /// Channel asset; credit assets get a trustline per escrow
    pub asset: Asset,
    /// Latest acceptance time of the formation transaction
    pub expires_at: SystemTime,
}

/// Builds the formation transaction for a channel open.
///
/// The transaction is valid at `starting_sequence` on the initiator escrow
/// and must execute before `expires_at`. Ingestion later validates that the
/// ledger changes it produced match [`ESCROW_THRESHOLDS`] and the two
/// channel signers exactly.
///
/// # Arguments
/// * `p` - Formation transaction parameters
///
/// # Returns
/// * `Ok(Transaction)` - The unsigned formation transaction
/// * `Err(TxBuildError::NonPositiveStartingSequence)` - If the starting sequence is not positive
/// * `Err(TxBuildError::InvalidExpiry)` - If the expiry precedes the unix epoch
pub fn formation(p: FormationParams) -> Result<Transaction, TxBuildError> {
    if p.starting_sequence <= 0 {
        return Err(TxBuildError::NonPositiveStartingSequence { got: p.starting_sequence });
    }
    let valid_before = p
        .expires_at
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TxBuildError::InvalidExpiry)?
        .as_secs();

    let mut operations = Vec::with_capacity(6);
    for escrow in [p.initiator_escrow, p.responder_escrow] {
        operations.push(Operation::SetOptions {
            account: escrow,
            master_weight: Some(ESCROW_THRESHOLDS.master_weight),
            low_threshold: Some(ESCROW_THRESHOLDS.low),
            medium_threshold: Some(ESCROW_THRESHOLDS.medium),
            high_threshold: Some(ESCROW_THRESHOLDS.high),
            signer: Some(SignerUpdate { key: p.initiator_signer, weight: 1 }),
        });
        operations.push(Operation::SetOptions {
            account: escrow,
            master_weight: None,
            low_threshold: None,
            medium_threshold: None,
            high_threshold: None,
            signer: Some(SignerUpdate { key: p.responder_signer, weight: 1 }),
        });
        if !p.asset.is_native() {
            operations.push(Operation::ChangeTrust { account: escrow, asset: p.asset.clone() });
        }
    }

    Ok(Transaction {
        source_account: p.initiator_escrow,
        sequence: p.starting_sequence,
        min_sequence_age: 0,
        min_sequence_ledger_gap: 0,
        valid_before: Some(valid_before),
        extra_signer: None,
        operations,
        signatures: vec![],
    })
}
