#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Escrow Channel
//!
//! A Rust library for two-party, bidirectional off-chain payment channels
//! built over an external ledger that settles signed transactions.
//!
//! Two participants lock funds into two on-ledger escrow accounts and
//! exchange signed transaction pairs, a *declaration* and a *close*,
//! representing the latest agreed balance. Either participant can submit
//! the most recent pair at any time and, after a programmable observation
//! delay, unilaterally close the channel at the agreed balance. A
//! cooperative fast-path skips the delay by mutual re-signing.
//!
//! The crate is the per-channel protocol state machine only: the
//! multi-round signature exchanges for open, payment and coordinated
//! close, the invariants they enforce, and the ingestion of observed
//! on-ledger transactions. Transport, submission, queries and timing are
//! the caller's responsibility; every operation is a pure state transition
//! over plain-data envelopes.

pub mod channel;
pub mod errors;
pub mod ledger;
pub mod txbuild;
pub mod types;

pub use channel::{Amount, Channel, ChannelStatus, Config, EscrowAccount, OpenParams};
pub use errors::{Error, Result};
pub use types::{Bytes32, TransactionHash};
