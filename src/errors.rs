//! Error types for the escrow-channel library
//!
//! This module defines all error types used throughout the library,
//! providing detailed error information for debugging and handling.

use thiserror::Error;

use crate::ledger::Asset;

/// The main error type for the escrow-channel library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Channel protocol errors
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Transaction construction errors
    #[error(transparent)]
    TxBuild(#[from] TxBuildError),

    /// Wire-format parsing errors
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors that can occur during channel operations
///
/// Protocol violations, resource failures, cryptographic failures and
/// lifecycle failures all report through this enum. No variant leaves the
/// channel in a partially-updated state: operations stage their changes and
/// commit only on fully-successful completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// The channel has not completed the open protocol, or the formation
    /// transaction has not yet been observed and validated on the ledger
    #[error("channel is not open")]
    NotOpen,

    /// An open agreement already exists for this channel
    #[error("an open agreement is already in progress")]
    OpenAlreadyInProgress,

    /// The open agreement expiry is in the past or beyond the configured
    /// maximum open expiry
    #[error("open agreement expiry is out of bounds")]
    OpenExpired,

    /// The open agreement details do not match the expected details for
    /// this channel
    #[error("open agreement does not match the expected open agreement")]
    OpenAgreementMismatch,

    /// An agreement names a signer that is not one of the channel's two
    /// known signers
    #[error("signer is not one of the channel signers")]
    SignerNotRecognized,

    /// A required signature is missing or does not verify
    #[error("signature is missing or invalid")]
    InvalidSignature,

    /// A rebuilt transaction hash does not match the hash declared in the
    /// agreement
    #[error("transaction hash does not match the agreement")]
    HashMismatch,

    /// Payment amount must be greater than zero
    #[error("payment amount must be greater than zero")]
    NonPositiveAmount,

    /// Payment asset does not equal the channel's asset
    #[error("payment asset is invalid, got: {got} want: {want}")]
    AssetMismatch {
        /// Asset carried by the payment
        got: Asset,
        /// Asset agreed at open
        want: Asset,
    },

    /// Balance arithmetic would overflow
    #[error("balance overflow: would exceed maximum value")]
    BalanceOverflow,

    /// An agreement's iteration number is not the next expected iteration
    #[error("invalid iteration number, got: {got} want: {want}")]
    IterationMismatch {
        /// Iteration number carried by the agreement
        got: i64,
        /// Iteration number the channel expects next
        want: i64,
    },

    /// An agreement's observation periods differ from the channel's
    /// configured observation periods
    #[error("invalid observation period: different than channel state")]
    ObservationPeriodMismatch,

    /// A different unauthorized agreement for the same iteration is already
    /// in progress
    #[error("close agreement does not match the close agreement already in progress")]
    DifferentPaymentInProgress,

    /// A new payment cannot start while an unfinished one exists
    #[error("cannot start a new payment while an unfinished one exists")]
    PaymentInProgress,

    /// The agreement is a payment to the proposer; payments must originate
    /// from the debtor
    #[error("close agreement is a payment to the proposer")]
    PaymentToProposer,

    /// The debtor's escrow balance cannot cover its obligation under the
    /// new agreement; callers may refresh balances and retry
    #[error("account is underfunded to make payment")]
    Underfunded,

    /// A coordinated close has been proposed; payments are disabled
    #[error("a coordinated close is in progress")]
    CoordinatedClosePending,

    /// A coordinated close has been authorized; payments are disabled
    #[error("a coordinated close has been authorized")]
    CoordinatedCloseAuthorized,

    /// A coordinated-close agreement does not match the latest authorized
    /// agreement
    #[error("close agreement does not match the latest authorized agreement")]
    CloseAgreementMismatch,

    /// Formation transaction validation failed
    #[error("invalid formation transaction: {0}")]
    InvalidFormation(&'static str),
}

/// Errors that can occur during transaction construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TxBuildError {
    /// Starting sequence must be greater than zero
    #[error("starting sequence must be greater than zero, got: {got}")]
    NonPositiveStartingSequence {
        /// Sequence supplied by the caller
        got: i64,
    },

    /// Iteration number must not be negative
    #[error("iteration number must not be negative, got: {got}")]
    NegativeIterationNumber {
        /// Iteration number supplied by the caller
        got: i64,
    },

    /// Payment amounts must not be negative
    #[error("payment amount must not be negative, got: {got}")]
    NegativeAmount {
        /// Amount supplied by the caller
        got: i64,
    },

    /// Sequence arithmetic would overflow
    #[error("sequence overflow: cannot compute iteration sequence")]
    SequenceOverflow,

    /// Expiry precedes the unix epoch
    #[error("expiry precedes the unix epoch")]
    InvalidExpiry,
}

/// Errors that can occur while parsing wire-format string encodings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// Input has the wrong length
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes
        expected: usize,
        /// Number of bytes found
        got: usize,
    },

    /// Input contains a non-hex character
    #[error("invalid hex digit")]
    InvalidHexDigit,

    /// Input is not a recognized asset encoding
    #[error("unknown asset encoding: {0}")]
    UnknownAsset(String),

    /// Input is not a valid ed25519 public key
    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
