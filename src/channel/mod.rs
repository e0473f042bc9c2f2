//! Channel module for bidirectional payment channels
//!
//! This module provides a deterministic state machine for two-party,
//! bidirectional payment channels backed by two on-ledger escrow accounts.
//! Participants lock funds at formation and exchange signed
//! declaration/close transaction pairs representing the latest agreed
//! balance; either side can submit the most recent pair at any time and,
//! after the observation period, close unilaterally at that balance.
//!
//! # Structure
//!
//! The module is organized into protocol phases:
//! - `agreement`: Open and close agreement envelopes
//! - `open`: Three-step open signature exchange
//! - `payment`: Iterated payment signature exchange
//! - `close`: Coordinated close with zero observation period
//! - `ingest`: Consumption of observed on-ledger transactions
//!
//! The aggregate is single-threaded by design: every operation is a
//! protocol step, and interleaving protocol steps is a protocol error, not
//! a performance concern. Callers wrapping a channel in a server must
//! serialize access. No operation suspends or performs I/O.

pub mod agreement;
mod close;
mod ingest;
mod open;
mod payment;

#[cfg(test)]
pub mod test_utils;

pub use agreement::{
    CloseAgreement, CloseAgreementDetails, CloseAgreementSignatures,
    CloseAgreementTransactionHashes, OpenAgreement, OpenAgreementDetails, OpenAgreementSignatures,
    OpenAgreementTransactionHashes,
};
pub use open::OpenParams;
pub use payment::Amount;

use std::time::Duration;

use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::ledger::AccountId;

/// An on-ledger escrow account as last observed by this participant.
///
/// The sequence number and balance are caches of ledger state, mutated only
/// by ingestion and by the explicit balance-update operations. A stale
/// balance yields only false negatives in the underfunded check, which the
/// caller resolves by refreshing and retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowAccount {
    /// On-ledger address of the escrow account
    pub address: AccountId,
    /// Last observed sequence number
    pub sequence_number: i64,
    /// Last observed balance in the channel asset
    pub balance: i64,
}

/// Configuration for constructing a [`Channel`].
pub struct Config {
    /// Arbitrary string mixed into every transaction hash
    pub network_passphrase: String,
    /// Upper bound on an open agreement's expiry relative to proposal time
    pub max_open_expiry: Duration,
    /// Whether the local participant is the channel initiator
    pub initiator: bool,
    /// The local participant's escrow account
    pub local_escrow_account: EscrowAccount,
    /// The remote participant's escrow account
    pub remote_escrow_account: EscrowAccount,
    /// The local participant's signing key
    pub local_signer: SigningKey,
    /// The remote participant's verifying key
    pub remote_signer: VerifyingKey,
}

/// Lifecycle of a channel as observable by one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The open protocol has not completed, or the formation transaction
    /// has not been observed and validated
    Opening,
    /// The channel is open; payments and closes are possible
    Open,
    /// A declaration for the latest authorized agreement has been observed
    Closing,
    /// A declaration for an older agreement has been observed; the latest
    /// declaration must be submitted to supersede it
    ClosingWithBumpRequired,
    /// A close transaction has been observed; the channel is closed
    Closed,
}

/// A two-party payment channel as held by one participant.
///
/// All mutating operations must be externally serialized.
pub struct Channel {
    pub(crate) network_passphrase: String,
    pub(crate) max_open_expiry: Duration,
    pub(crate) initiator: bool,

    pub(crate) local_escrow_account: EscrowAccount,
    pub(crate) remote_escrow_account: EscrowAccount,

    pub(crate) local_signer: SigningKey,
    pub(crate) remote_signer: VerifyingKey,

    pub(crate) open_agreement: Option<OpenAgreement>,
    pub(crate) open_executed_and_validated: bool,

    pub(crate) latest_authorized_close_agreement: Option<CloseAgreement>,
    pub(crate) latest_unauthorized_close_agreement: Option<CloseAgreement>,

    pub(crate) observed_declaration_iteration: Option<i64>,
    pub(crate) observed_close: bool,
}

impl Channel {
    /// Creates a channel from its configuration.
    ///
    /// # Arguments
    /// * `config` - The channel's network, role, escrow accounts and keys
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use ed25519_dalek::SigningKey;
    /// use escrow_channel::ledger::AccountId;
    /// use escrow_channel::{Channel, Config, EscrowAccount};
    ///
    /// let local_signer = SigningKey::from_bytes(&[1u8; 32]);
    /// let remote_signer = SigningKey::from_bytes(&[2u8; 32]).verifying_key();
    /// let channel = Channel::new(Config {
    ///     network_passphrase: "Example Network ; 2024".to_string(),
    ///     max_open_expiry: Duration::from_secs(60 * 60),
    ///     initiator: true,
    ///     local_escrow_account: EscrowAccount {
    ///         address: AccountId::from_bytes([3u8; 32]),
    ///         sequence_number: 101,
    ///         balance: 0,
    ///     },
    ///     remote_escrow_account: EscrowAccount {
    ///         address: AccountId::from_bytes([4u8; 32]),
    ///         sequence_number: 202,
    ///         balance: 0,
    ///     },
    ///     local_signer,
    ///     remote_signer,
    /// });
    /// assert!(channel.is_initiator());
    /// assert_eq!(channel.next_iteration_number(), 1);
    /// ```
    pub fn new(config: Config) -> Self {
        Channel {
            network_passphrase: config.network_passphrase,
            max_open_expiry: config.max_open_expiry,
            initiator: config.initiator,
            local_escrow_account: config.local_escrow_account,
            remote_escrow_account: config.remote_escrow_account,
            local_signer: config.local_signer,
            remote_signer: config.remote_signer,
            open_agreement: None,
            open_executed_and_validated: false,
            latest_authorized_close_agreement: None,
            latest_unauthorized_close_agreement: None,
            observed_declaration_iteration: None,
            observed_close: false,
        }
    }

    /// Returns whether the local participant is the channel initiator.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Returns the amount owed from the initiator to the responder if
    /// positive, or from the responder to the initiator if negative.
    pub fn balance(&self) -> i64 {
        self.latest_authorized_close_agreement
            .as_ref()
            .map(|ca| ca.details.balance)
            .unwrap_or(0)
    }

    /// Returns the iteration number the next agreement must carry.
    pub fn next_iteration_number(&self) -> i64 {
        if let Some(ua) = &self.latest_unauthorized_close_agreement {
            return ua.details.iteration_number;
        }
        self.latest_authorized_close_agreement
            .as_ref()
            .map(|ca| ca.details.iteration_number)
            .unwrap_or(0)
            + 1
    }

    /// Returns the open agreement, if one has been proposed or authorized.
    pub fn open_agreement(&self) -> Option<&OpenAgreement> {
        self.open_agreement.as_ref()
    }

    /// Returns the latest authorized close agreement, if any.
    pub fn latest_close_agreement(&self) -> Option<&CloseAgreement> {
        self.latest_authorized_close_agreement.as_ref()
    }

    /// Returns the local escrow account as last observed.
    pub fn local_escrow_account(&self) -> &EscrowAccount {
        &self.local_escrow_account
    }

    /// Returns the remote escrow account as last observed.
    pub fn remote_escrow_account(&self) -> &EscrowAccount {
        &self.remote_escrow_account
    }

    /// Replaces the cached local escrow balance with a freshly queried one.
    pub fn update_local_escrow_account_balance(&mut self, balance: i64) {
        self.local_escrow_account.balance = balance;
    }

    /// Replaces the cached remote escrow balance with a freshly queried
    /// one.
    pub fn update_remote_escrow_account_balance(&mut self, balance: i64) {
        self.remote_escrow_account.balance = balance;
    }

    /// Reports the channel lifecycle as derived from agreements and
    /// observed ledger activity.
    pub fn status(&self) -> ChannelStatus {
        if self.observed_close {
            return ChannelStatus::Closed;
        }
        if let Some(observed) = self.observed_declaration_iteration {
            let latest = self
                .latest_authorized_close_agreement
                .as_ref()
                .map(|ca| ca.details.iteration_number)
                .unwrap_or(0);
            if observed < latest {
                return ChannelStatus::ClosingWithBumpRequired;
            }
            return ChannelStatus::Closing;
        }
        if self.is_open() {
            ChannelStatus::Open
        } else {
            ChannelStatus::Opening
        }
    }

    // ------------------------------------------------------------------
    // Internal projections
    // ------------------------------------------------------------------

    /// True once the open protocol authorized an agreement and the
    /// formation transaction was observed and validated.
    pub(crate) fn is_open(&self) -> bool {
        self.latest_authorized_close_agreement.is_some() && self.open_executed_and_validated
    }

    pub(crate) fn local_signer_key(&self) -> VerifyingKey {
        self.local_signer.verifying_key()
    }

    pub(crate) fn initiator_escrow_account(&self) -> &EscrowAccount {
        if self.initiator {
            &self.local_escrow_account
        } else {
            &self.remote_escrow_account
        }
    }

    pub(crate) fn responder_escrow_account(&self) -> &EscrowAccount {
        if self.initiator {
            &self.remote_escrow_account
        } else {
            &self.local_escrow_account
        }
    }

    pub(crate) fn set_initiator_escrow_sequence(&mut self, sequence: i64) {
        if self.initiator {
            self.local_escrow_account.sequence_number = sequence;
        } else {
            self.remote_escrow_account.sequence_number = sequence;
        }
    }

    pub(crate) fn initiator_signer(&self) -> VerifyingKey {
        if self.initiator {
            self.local_signer_key()
        } else {
            self.remote_signer
        }
    }

    pub(crate) fn responder_signer(&self) -> VerifyingKey {
        if self.initiator {
            self.remote_signer
        } else {
            self.local_signer_key()
        }
    }

    /// True if the pair of signers names exactly the channel's two known
    /// signers, one on each side.
    pub(crate) fn signers_are_known(
        &self,
        proposing_signer: &VerifyingKey,
        confirming_signer: &VerifyingKey,
    ) -> bool {
        let local = self.local_signer_key();
        let remote = self.remote_signer;
        (*proposing_signer == local && *confirming_signer == remote)
            || (*proposing_signer == remote && *confirming_signer == local)
    }

    /// True if a coordinated close has been proposed or authorized, which
    /// disables further payments.
    pub(crate) fn coordinated_close_proposed(&self) -> bool {
        self.latest_unauthorized_close_agreement
            .as_ref()
            .map(|ua| ua.details.has_zero_observation_period())
            .unwrap_or(false)
            || self.coordinated_close_authorized()
    }

    /// True if a coordinated close has been fully authorized.
    pub(crate) fn coordinated_close_authorized(&self) -> bool {
        self.latest_authorized_close_agreement
            .as_ref()
            .map(|ca| ca.details.has_zero_observation_period())
            .unwrap_or(false)
    }
}

/// Amount the close transaction pays responder → initiator for a balance.
pub(crate) fn amount_to_initiator(balance: i64) -> i64 {
    balance.saturating_neg().max(0)
}

/// Amount the close transaction pays initiator → responder for a balance.
pub(crate) fn amount_to_responder(balance: i64) -> i64 {
    balance.max(0)
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_amount_projections() {
        assert_eq!(amount_to_initiator(100), 0);
        assert_eq!(amount_to_initiator(-100), 100);
        assert_eq!(amount_to_initiator(0), 0);
        assert_eq!(amount_to_responder(100), 100);
        assert_eq!(amount_to_responder(-100), 0);
        assert_eq!(amount_to_responder(0), 0);
    }

    #[test]
    fn test_role_projections() {
        let (initiator_channel, responder_channel) = channel_pair();

        assert_eq!(
            initiator_channel.initiator_signer(),
            initiator_channel.local_signer_key()
        );
        assert_eq!(
            responder_channel.initiator_signer(),
            responder_channel.remote_signer
        );
        assert_eq!(
            initiator_channel.initiator_escrow_account().address,
            responder_channel.initiator_escrow_account().address,
        );
        assert_eq!(
            initiator_channel.responder_escrow_account().address,
            responder_channel.responder_escrow_account().address,
        );
    }

    #[test]
    fn test_new_channel_starts_empty() {
        let (channel, _) = channel_pair();
        assert_eq!(channel.balance(), 0);
        assert_eq!(channel.next_iteration_number(), 1);
        assert!(channel.open_agreement().is_none());
        assert!(channel.latest_close_agreement().is_none());
        assert_eq!(channel.status(), ChannelStatus::Opening);
    }

    #[test]
    fn test_signers_are_known() {
        let (channel, _) = channel_pair();
        let local = channel.local_signer_key();
        let remote = channel.remote_signer;
        let stranger = stranger_signer().verifying_key();

        assert!(channel.signers_are_known(&local, &remote));
        assert!(channel.signers_are_known(&remote, &local));
        assert!(!channel.signers_are_known(&local, &local));
        assert!(!channel.signers_are_known(&stranger, &remote));
        assert!(!channel.signers_are_known(&local, &stranger));
    }

    #[test]
    fn test_balance_update_operations() {
        let (mut channel, _) = channel_pair();
        channel.update_local_escrow_account_balance(500);
        channel.update_remote_escrow_account_balance(700);
        assert_eq!(channel.local_escrow_account().balance, 500);
        assert_eq!(channel.remote_escrow_account().balance, 700);
    }
}
