//! Declaration transaction builder
//!
//! The declaration is the first transaction in an iteration's pair. Its
//! only effect is consuming the iteration's first sequence slot, which
//! starts the observation clock for the matching close transaction. The
//! close-transaction hash is attached as an extra required payload signer,
//! tying the declaration's on-ledger acceptance to possession of a valid
//! close signature by the confirming signer.

use ed25519_dalek::VerifyingKey;

use crate::errors::TxBuildError;
use crate::ledger::{AccountId, Operation, PayloadSigner, Transaction};
use crate::txbuild::close_sequence_of_iteration;
use crate::types::TransactionHash;

/// Parameters for building a declaration transaction.
#[derive(Debug, Clone)]
pub struct DeclarationParams {
    /// Initiator's escrow account
    pub initiator_escrow: AccountId,
    /// Initiator-escrow sequence at which the formation transaction is valid
    pub starting_sequence: i64,
    /// Iteration the pair belongs to
    pub iteration_number: i64,
    /// Iteration already executed on-ledger; reserved for partial-execution
    /// recovery and zero until that feature lands
    pub iteration_number_executed: i64,
    /// Confirming signer whose close signature the declaration requires
    pub confirming_signer: VerifyingKey,
    /// Hash of the matching close transaction
    pub close_tx_hash: TransactionHash,
}

/// Builds the declaration transaction for an iteration.
///
/// The transaction consumes the first sequence slot of the iteration,
/// `starting_sequence + 2 * iteration_number - 1`, directly before its
/// matching close transaction.
///
/// # Arguments
/// * `p` - Declaration transaction parameters
///
/// # Returns
/// * `Ok(Transaction)` - The unsigned declaration transaction
/// * `Err(TxBuildError::NegativeIterationNumber)` - If the iteration number or executed iteration number is negative
/// * `Err(TxBuildError::NonPositiveStartingSequence)` - If the starting sequence is not positive
/// * `Err(TxBuildError::SequenceOverflow)` - If the iteration's sequence cannot be computed
///
/// # Examples
///
/// ```rust
/// use ed25519_dalek::SigningKey;
/// use escrow_channel::ledger::AccountId;
/// use escrow_channel::txbuild::{declaration, DeclarationParams};
/// use escrow_channel::TransactionHash;
///
/// let tx = declaration(DeclarationParams {
///     initiator_escrow: AccountId::from_bytes([3u8; 32]),
///     starting_sequence: 101,
///     iteration_number: 1,
///     iteration_number_executed: 0,
///     confirming_signer: SigningKey::from_bytes(&[2u8; 32]).verifying_key(),
///     close_tx_hash: TransactionHash([9u8; 32]),
/// })?;
/// assert_eq!(tx.sequence, 102);
/// # Ok::<(), escrow_channel::errors::TxBuildError>(())
/// ```
pub fn declaration(p: DeclarationParams) -> Result<Transaction, TxBuildError> {
    if p.iteration_number_executed < 0 {
        return Err(TxBuildError::NegativeIterationNumber { got: p.iteration_number_executed });
    }

    let close_sequence = close_sequence_of_iteration(p.starting_sequence, p.iteration_number)?;
    let sequence = close_sequence.checked_sub(1).ok_or(TxBuildError::SequenceOverflow)?;
    let executed_sequence =
        close_sequence_of_iteration(p.starting_sequence, p.iteration_number_executed)?;

    Ok(Transaction {
        source_account: p.initiator_escrow,
        sequence,
        min_sequence_age: 0,
        min_sequence_ledger_gap: 0,
        valid_before: None,
        extra_signer: Some(PayloadSigner {
            signer: p.confirming_signer,
            payload: p.close_tx_hash,
        }),
        operations: vec![Operation::BumpSequence {
            account: p.initiator_escrow,
            to: executed_sequence,
        }],
        signatures: vec![],
    })
}
