//! Close transaction builder
//!
//! The close transaction is the second transaction in an iteration's pair.
//! It hands each participant sole authority over their own escrow account
//! and redistributes the agreed balance. The ledger refuses it until the
//! declaration's sequence has aged past the observation period.

use std::time::Duration;

use ed25519_dalek::VerifyingKey;

use crate::errors::TxBuildError;
use crate::ledger::{Asset, AccountId, Operation, SignerUpdate, Transaction};
use crate::txbuild::close_sequence_of_iteration;

/// Parameters for building a close transaction.
#[derive(Debug, Clone)]
pub struct CloseParams {
    /// Minimum sequence age enforced between declaration and close
    pub observation_period_time: Duration,
    /// Minimum ledger gap enforced between declaration and close
    pub observation_period_ledger_gap: i64,
    /// Initiator participant's signer key
    pub initiator_signer: VerifyingKey,
    /// Responder participant's signer key
    pub responder_signer: VerifyingKey,
    /// Initiator's escrow account
    pub initiator_escrow: AccountId,
    /// Responder's escrow account
    pub responder_escrow: AccountId,
    /// Initiator-escrow sequence at which the formation transaction is valid
    pub starting_sequence: i64,
    /// Iteration the pair belongs to
    pub iteration_number: i64,
    /// Amount paid responder → initiator; zero when the balance favors the
    /// responder
    pub amount_to_initiator: i64,
    /// Amount paid initiator → responder; zero when the balance favors the
    /// initiator
    pub amount_to_responder: i64,
    /// Channel asset
    pub asset: Asset,
}

/// Builds the close transaction for an iteration.
///
/// The transaction consumes the second sequence slot of the iteration,
/// `starting_sequence + 2 * iteration_number`, and carries the observation
/// periods as minimum-sequence constraints so the ledger refuses it until
/// the declaration has aged.
///
/// # Arguments
/// * `p` - Close transaction parameters
///
/// # Returns
/// * `Ok(Transaction)` - The unsigned close transaction
/// * `Err(TxBuildError::NegativeAmount)` - If either payment amount is negative
/// * `Err(TxBuildError::NonPositiveStartingSequence)` - If the starting sequence is not positive
/// * `Err(TxBuildError::NegativeIterationNumber)` - If the iteration number is negative
/// * `Err(TxBuildError::SequenceOverflow)` - If the iteration's sequence cannot be computed
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use ed25519_dalek::SigningKey;
/// use escrow_channel::ledger::{AccountId, Asset};
/// use escrow_channel::txbuild::{close, CloseParams};
///
/// let tx = close(CloseParams {
///     observation_period_time: Duration::from_secs(300),
///     observation_period_ledger_gap: 5,
///     initiator_signer: SigningKey::from_bytes(&[1u8; 32]).verifying_key(),
///     responder_signer: SigningKey::from_bytes(&[2u8; 32]).verifying_key(),
///     initiator_escrow: AccountId::from_bytes([3u8; 32]),
///     responder_escrow: AccountId::from_bytes([4u8; 32]),
///     starting_sequence: 101,
///     iteration_number: 1,
///     amount_to_initiator: 0,
///     amount_to_responder: 40,
///     asset: Asset::Native,
/// })?;
/// assert_eq!(tx.sequence, 103);
/// assert_eq!(tx.min_sequence_age, 300);
/// # Ok::<(), escrow_channel::errors::TxBuildError>(())
/// ```
pub fn close(p: CloseParams) -> Result<Transaction, TxBuildError> {
    if p.amount_to_initiator < 0 {
        return Err(TxBuildError::NegativeAmount { got: p.amount_to_initiator });
    }
    if p.amount_to_responder < 0 {
        return Err(TxBuildError::NegativeAmount { got: p.amount_to_responder });
    }

    let sequence = close_sequence_of_iteration(p.starting_sequence, p.iteration_number)?;

    // Each participant's signer is dropped from the other's escrow, leaving
    // every account under the sole authority of its own participant.
    let mut operations = vec![
        Operation::SetOptions {
            account: p.initiator_escrow,
            master_weight: Some(0),
            low_threshold: Some(1),
            medium_threshold: Some(1),
            high_threshold: Some(1),
            signer: Some(SignerUpdate { key: p.responder_signer, weight: 0 }),
        },
        Operation::SetOptions {
            account: p.responder_escrow,
            master_weight: Some(0),
            low_threshold: Some(1),
            medium_threshold: Some(1),
            high_threshold: Some(1),
            signer: Some(SignerUpdate { key: p.initiator_signer, weight: 0 }),
        },
    ];
    if p.amount_to_initiator != 0 {
        operations.push(Operation::Payment {
            from: p.responder_escrow,
            to: p.initiator_escrow,
            asset: p.asset.clone(),
            amount: p.amount_to_initiator,
        });
    }
    if p.amount_to_responder != 0 {
        operations.push(Operation::Payment {
            from: p.initiator_escrow,
            to: p.responder_escrow,
            asset: p.asset,
            amount: p.amount_to_responder,
        });
    }

    Ok(Transaction {
        source_account: p.initiator_escrow,
        sequence,
        min_sequence_age: p.observation_period_time.as_secs(),
        min_sequence_ledger_gap: p.observation_period_ledger_gap,
        valid_before: None,
        extra_signer: None,
        operations,
        signatures: vec![],
    })
}
