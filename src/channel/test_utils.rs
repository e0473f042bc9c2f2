//! Shared test utilities for channel module tests
//!
//! This module provides common helper functions used across all channel
//! module tests: deterministic keys, channel pair fixtures, and fabricated
//! formation result metadata so ingestion can be driven without a ledger.

use std::time::{Duration, SystemTime};

use ed25519_dalek::SigningKey;

use crate::channel::{Channel, Config, EscrowAccount, OpenParams};
use crate::ledger::{
    AccountEntry, Asset, AccountId, LedgerEntryUpdate, TransactionResult, TransactionResultMeta,
    TrustlineEntry,
};
use crate::txbuild::ESCROW_THRESHOLDS;

/// Network passphrase used across channel tests
pub const TEST_NETWORK: &str = "Escrow Channel Test Network ; 2024";

/// Deterministically derive a signing key from a single byte (tests only)
pub fn deterministic_signer(byte: u8) -> SigningKey {
    SigningKey::from_bytes(&[byte; 32])
}

/// The initiator's and responder's signing keys
pub fn signing_keys() -> (SigningKey, SigningKey) {
    (deterministic_signer(1), deterministic_signer(2))
}

/// A signing key that is not a channel participant
pub fn stranger_signer() -> SigningKey {
    deterministic_signer(9)
}

/// The initiator's and responder's escrow accounts
pub fn escrow_accounts() -> (EscrowAccount, EscrowAccount) {
    let initiator_escrow = EscrowAccount {
        address: AccountId::from_bytes([3u8; 32]),
        sequence_number: 101,
        balance: 0,
    };
    let responder_escrow = EscrowAccount {
        address: AccountId::from_bytes([4u8; 32]),
        sequence_number: 202,
        balance: 0,
    };
    (initiator_escrow, responder_escrow)
}

/// A matched pair of channels, initiator first, before any open exchange
pub fn channel_pair() -> (Channel, Channel) {
    let (initiator_signer, responder_signer) = signing_keys();
    let (initiator_escrow, responder_escrow) = escrow_accounts();

    let initiator_channel = Channel::new(Config {
        network_passphrase: TEST_NETWORK.to_string(),
        max_open_expiry: Duration::from_secs(2 * 60 * 60),
        initiator: true,
        local_escrow_account: initiator_escrow.clone(),
        remote_escrow_account: responder_escrow.clone(),
        local_signer: initiator_signer.clone(),
        remote_signer: responder_signer.verifying_key(),
    });
    let responder_channel = Channel::new(Config {
        network_passphrase: TEST_NETWORK.to_string(),
        max_open_expiry: Duration::from_secs(2 * 60 * 60),
        initiator: false,
        local_escrow_account: responder_escrow,
        remote_escrow_account: initiator_escrow,
        local_signer: responder_signer,
        remote_signer: initiator_signer.verifying_key(),
    });
    (initiator_channel, responder_channel)
}

/// Open parameters for a native-asset channel expiring well in the future
pub fn open_params() -> OpenParams {
    OpenParams {
        observation_period_time: Duration::from_secs(300),
        observation_period_ledger_gap: 5,
        asset: Asset::Native,
        expires_at: SystemTime::now() + Duration::from_secs(5 * 60),
    }
}

/// Fabricates the result metadata a successful formation transaction leaves
/// on the ledger for the given channel.
pub fn formation_result_meta(channel: &Channel) -> TransactionResultMeta {
    let open = channel.open_agreement().expect("open agreement required").clone();
    let signers = vec![(channel.initiator_signer(), 1), (channel.responder_signer(), 1)];

    let initiator_address = channel.initiator_escrow_account().address;
    let mut updates = Vec::new();
    for escrow in [channel.initiator_escrow_account(), channel.responder_escrow_account()] {
        let sequence = if escrow.address == initiator_address {
            open.details.starting_sequence
        } else {
            escrow.sequence_number
        };
        updates.push(LedgerEntryUpdate::Account(AccountEntry {
            address: escrow.address,
            sequence,
            balance: escrow.balance,
            thresholds: ESCROW_THRESHOLDS,
            signers: signers.clone(),
        }));
        if !open.details.asset.is_native() {
            updates.push(LedgerEntryUpdate::Trustline(TrustlineEntry {
                account: escrow.address,
                asset: open.details.asset.clone(),
                balance: escrow.balance,
            }));
        }
    }
    TransactionResultMeta { updates }
}

/// A successful transaction result
pub fn successful_result() -> TransactionResult {
    TransactionResult { successful: true }
}

/// A matched pair of channels taken through the full open protocol,
/// formation ingestion, and funded with 1000 on each escrow
pub fn open_channel_pair() -> (Channel, Channel) {
    let (mut initiator_channel, mut responder_channel) = channel_pair();

    let envelope = initiator_channel.propose_open(open_params()).expect("propose open");
    let envelope = responder_channel.confirm_open(envelope).expect("responder confirm open");
    initiator_channel.confirm_open(envelope).expect("initiator confirm open");

    let formation_tx = initiator_channel.open_tx().expect("formation tx");
    let meta = formation_result_meta(&initiator_channel);
    initiator_channel
        .ingest_tx(&formation_tx, &successful_result(), &meta)
        .expect("initiator ingests formation");
    responder_channel
        .ingest_tx(&formation_tx, &successful_result(), &meta)
        .expect("responder ingests formation");

    initiator_channel.update_local_escrow_account_balance(1000);
    initiator_channel.update_remote_escrow_account_balance(1000);
    responder_channel.update_local_escrow_account_balance(1000);
    responder_channel.update_remote_escrow_account_balance(1000);

    (initiator_channel, responder_channel)
}
