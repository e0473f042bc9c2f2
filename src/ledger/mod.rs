//! Primitive ledger types
//!
//! This module models the thin slice of the external ledger the channel
//! core depends on: assets, account addresses, a deterministic transaction
//! representation with canonical hashing and detached ed25519 signatures,
//! and the observed transaction result metadata consumed by ingestion.
//!
//! The ledger itself (submission, sequence and balance queries, timing of
//! the observation period) is the caller's responsibility. Nothing in this
//! module performs I/O.

pub mod asset;
pub mod keys;
pub mod meta;
pub mod tx;

pub use asset::Asset;
pub use keys::{signer_hint, AccountId};
pub use meta::{
    AccountEntry, LedgerEntryUpdate, Thresholds, TransactionResult, TransactionResultMeta,
    TrustlineEntry,
};
pub use tx::{DecoratedSignature, Operation, PayloadSigner, SignerUpdate, Transaction};
