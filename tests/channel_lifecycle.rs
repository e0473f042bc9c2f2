//! End-to-end test: channel open, payments, coordinated close, and closure
//! detection driven through two matched channels and fabricated ledger
//! observations.

use std::time::{Duration, SystemTime};

use anyhow::Result;
use ed25519_dalek::SigningKey;

use escrow_channel::channel::{CloseAgreement, OpenParams};
use escrow_channel::errors::ChannelError;
use escrow_channel::ledger::{
    AccountEntry, Asset, AccountId, LedgerEntryUpdate, TransactionResult, TransactionResultMeta,
};
use escrow_channel::txbuild::ESCROW_THRESHOLDS;
use escrow_channel::{Amount, Channel, ChannelStatus, Config, Error, EscrowAccount};

const NETWORK: &str = "Escrow Channel Lifecycle Test ; 2024";

struct Participants {
    initiator: Channel,
    responder: Channel,
}

fn participants() -> Participants {
    let initiator_signer = SigningKey::from_bytes(&[11u8; 32]);
    let responder_signer = SigningKey::from_bytes(&[12u8; 32]);

    let initiator_escrow = EscrowAccount {
        address: AccountId::from_bytes([13u8; 32]),
        sequence_number: 101,
        balance: 0,
    };
    let responder_escrow = EscrowAccount {
        address: AccountId::from_bytes([14u8; 32]),
        sequence_number: 202,
        balance: 0,
    };

    let initiator = Channel::new(Config {
        network_passphrase: NETWORK.to_string(),
        max_open_expiry: Duration::from_secs(2 * 60 * 60),
        initiator: true,
        local_escrow_account: initiator_escrow.clone(),
        remote_escrow_account: responder_escrow.clone(),
        local_signer: initiator_signer.clone(),
        remote_signer: responder_signer.verifying_key(),
    });
    let responder = Channel::new(Config {
        network_passphrase: NETWORK.to_string(),
        max_open_expiry: Duration::from_secs(2 * 60 * 60),
        initiator: false,
        local_escrow_account: responder_escrow,
        remote_escrow_account: initiator_escrow,
        local_signer: responder_signer,
        remote_signer: initiator_signer.verifying_key(),
    });
    Participants { initiator, responder }
}

/// Fabricates the result metadata a successful formation transaction
/// leaves on the ledger.
fn formation_meta(channel: &Channel, funding: i64) -> TransactionResultMeta {
    let open = channel.open_agreement().expect("open agreement").clone();
    let (initiator_escrow, responder_escrow) = if channel.is_initiator() {
        (channel.local_escrow_account().clone(), channel.remote_escrow_account().clone())
    } else {
        (channel.remote_escrow_account().clone(), channel.local_escrow_account().clone())
    };
    let signers = vec![
        (open.details.proposing_signer, 1),
        (open.details.confirming_signer, 1),
    ];

    TransactionResultMeta {
        updates: vec![
            LedgerEntryUpdate::Account(AccountEntry {
                address: initiator_escrow.address,
                sequence: open.details.starting_sequence,
                balance: funding,
                thresholds: ESCROW_THRESHOLDS,
                signers: signers.clone(),
            }),
            LedgerEntryUpdate::Account(AccountEntry {
                address: responder_escrow.address,
                sequence: responder_escrow.sequence_number,
                balance: funding,
                thresholds: ESCROW_THRESHOLDS,
                signers,
            }),
        ],
    }
}

fn success() -> TransactionResult {
    TransactionResult { successful: true }
}

/// Relays an envelope across the "transport" by serializing and
/// deserializing it, as the framed-message layer would.
fn relay(envelope: &CloseAgreement) -> Result<CloseAgreement> {
    let wire = serde_json::to_string(envelope)?;
    Ok(serde_json::from_str(&wire)?)
}

fn open_params() -> OpenParams {
    OpenParams {
        observation_period_time: Duration::from_secs(300),
        observation_period_ledger_gap: 5,
        asset: Asset::Native,
        expires_at: SystemTime::now() + Duration::from_secs(5 * 60),
    }
}

fn open_and_fund(p: &mut Participants, funding: i64) -> Result<()> {
    let envelope = p.initiator.propose_open(open_params())?;
    let envelope = p.responder.confirm_open(envelope)?;
    p.initiator.confirm_open(envelope)?;

    let formation_tx = p.initiator.open_tx()?;
    let meta = formation_meta(&p.initiator, funding);
    p.initiator.ingest_tx(&formation_tx, &success(), &meta)?;
    p.responder.ingest_tx(&formation_tx, &success(), &meta)?;
    Ok(())
}

fn pay(p: &mut Participants, amount: i64) -> Result<CloseAgreement> {
    let proposal = p.initiator.propose_payment(Amount { asset: Asset::Native, amount })?;
    let confirmed = p.responder.confirm_payment(relay(&proposal)?)?;
    let settled = p.initiator.confirm_payment(relay(&confirmed)?)?;
    p.responder.confirm_payment(relay(&settled)?)?;
    Ok(settled)
}

#[test]
fn payments_are_gated_on_formation_ingestion() -> Result<()> {
    let mut p = participants();

    // Fresh channel: payments are refused.
    assert_eq!(
        p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 10 }),
        Err(Error::Channel(ChannelError::NotOpen))
    );

    // Open authorized but formation not yet observed: still refused.
    let envelope = p.initiator.propose_open(open_params())?;
    let envelope = p.responder.confirm_open(envelope)?;
    p.initiator.confirm_open(envelope)?;
    assert_eq!(
        p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 10 }),
        Err(Error::Channel(ChannelError::NotOpen))
    );

    // After ingesting a valid formation the same call succeeds.
    let formation_tx = p.initiator.open_tx()?;
    let meta = formation_meta(&p.initiator, 1000);
    p.initiator.ingest_tx(&formation_tx, &success(), &meta)?;
    p.responder.ingest_tx(&formation_tx, &success(), &meta)?;
    assert!(p
        .initiator
        .propose_payment(Amount { asset: Asset::Native, amount: 10 })
        .is_ok());
    Ok(())
}

#[test]
fn single_payment_advances_the_authorized_agreement() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;
    assert_eq!(p.initiator.balance(), 0);

    let settled = pay(&mut p, 100)?;
    assert_eq!(settled.details.iteration_number, 1);
    assert_eq!(settled.details.balance, 100);

    for channel in [&p.initiator, &p.responder] {
        let latest = channel.latest_close_agreement().expect("authorized agreement");
        assert_eq!(latest.details.iteration_number, 1);
        assert_eq!(latest.details.balance, 100);
        assert!(latest.is_authorized());
        assert_eq!(channel.balance(), 100);
    }
    Ok(())
}

#[test]
fn iteration_numbers_increase_strictly_across_payments() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;

    let mut previous = 0;
    for amount in [100, 50, 25] {
        let settled = pay(&mut p, amount)?;
        assert_eq!(settled.details.iteration_number, previous + 1);
        previous = settled.details.iteration_number;
    }
    assert_eq!(p.initiator.balance(), 175);
    Ok(())
}

#[test]
fn underfunded_payment_passes_after_balance_refresh() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 100)?;

    assert_eq!(
        p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 110 }),
        Err(Error::Channel(ChannelError::Underfunded))
    );
    assert_eq!(p.initiator.balance(), 0);

    p.initiator.update_local_escrow_account_balance(200);
    let proposal = p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 110 })?;
    assert_eq!(proposal.details.balance, 110);

    // The responder still sees the stale balance until it refreshes too.
    assert_eq!(
        p.responder.confirm_payment(relay(&proposal)?),
        Err(Error::Channel(ChannelError::Underfunded))
    );
    p.responder.update_remote_escrow_account_balance(200);
    let confirmed = p.responder.confirm_payment(relay(&proposal)?)?;
    let settled = p.initiator.confirm_payment(relay(&confirmed)?)?;
    assert_eq!(settled.details.balance, 110);
    Ok(())
}

#[test]
fn duplicate_confirmation_is_idempotent() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;

    let settled = pay(&mut p, 100)?;

    // A network retry delivers the same fully signed envelope again.
    let repeat = p.initiator.confirm_payment(relay(&settled)?)?;
    assert_eq!(repeat, settled);
    assert_eq!(p.initiator.balance(), 100);
    assert!(p.initiator.latest_close_agreement().unwrap().is_authorized());
    Ok(())
}

#[test]
fn coordinated_close_re_signs_at_zero_observation_period() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;
    pay(&mut p, 100)?;

    let proposal = p.initiator.propose_close()?;
    assert_eq!(proposal.details.iteration_number, 1);
    assert_eq!(proposal.details.balance, 100);
    assert_eq!(proposal.details.observation_period_time, Duration::ZERO);
    assert_eq!(proposal.details.observation_period_ledger_gap, 0);

    let confirmed = p.responder.confirm_close(relay(&proposal)?)?;
    let settled = p.initiator.confirm_close(relay(&confirmed)?)?;
    assert!(settled.is_authorized());

    // Both sides hold the zero-delay pair at the same balance.
    for channel in [&p.initiator, &p.responder] {
        let (_, close_tx) = channel.close_txs()?;
        assert_eq!(close_tx.min_sequence_age, 0);
        assert_eq!(close_tx.min_sequence_ledger_gap, 0);
    }

    // Payments are over.
    assert_eq!(
        p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 1 }),
        Err(Error::Channel(ChannelError::CoordinatedCloseAuthorized))
    );
    Ok(())
}

#[test]
fn competing_payment_proposals_do_not_corrupt_state() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;

    let proposal = p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 50 })?;
    // The responder proposes its own payment for the same iteration.
    let competing = p.responder.propose_payment(Amount { asset: Asset::Native, amount: 60 })?;

    assert_eq!(
        p.initiator.confirm_payment(relay(&competing)?),
        Err(Error::Channel(ChannelError::DifferentPaymentInProgress))
    );

    // The responder holds its own in-flight proposal and refuses the
    // initiator's for the same reason. Neither side's state moved; both
    // proposals can be abandoned and a new round started.
    assert_eq!(
        p.responder.confirm_payment(relay(&proposal)?),
        Err(Error::Channel(ChannelError::DifferentPaymentInProgress))
    );
    assert_eq!(p.initiator.balance(), 0);
    assert_eq!(p.responder.balance(), 0);
    Ok(())
}

#[test]
fn unilateral_close_path_is_always_available() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;
    pay(&mut p, 100)?;

    // The latest authorized pair can be submitted by either side.
    let (declaration_tx, close_tx) = p.initiator.close_txs()?;
    assert_eq!(declaration_tx.sequence + 1, close_tx.sequence);
    assert_eq!(close_tx.min_sequence_age, 300);

    // Observing the declaration then the close walks the channel through
    // Closing into Closed on both sides.
    for channel in [&mut p.initiator, &mut p.responder] {
        channel.ingest_tx(&declaration_tx, &success(), &TransactionResultMeta::default())?;
        assert_eq!(channel.status(), ChannelStatus::Closing);
        channel.ingest_tx(&close_tx, &success(), &TransactionResultMeta::default())?;
        assert_eq!(channel.status(), ChannelStatus::Closed);
    }
    Ok(())
}

#[test]
fn proposer_recovers_confirmer_signatures_from_published_declaration() -> Result<()> {
    let mut p = participants();
    open_and_fund(&mut p, 1000)?;

    let proposal = p.initiator.propose_payment(Amount { asset: Asset::Native, amount: 100 })?;
    // The responder authorizes but its reply is lost; it publishes the
    // declaration instead.
    p.responder.confirm_payment(relay(&proposal)?)?;
    let (declaration_tx, _) = p.responder.close_txs()?;

    p.initiator.ingest_tx(&declaration_tx, &success(), &TransactionResultMeta::default())?;

    assert_eq!(p.initiator.balance(), 100);
    assert!(p.initiator.latest_close_agreement().unwrap().is_authorized());
    assert_eq!(p.initiator.status(), ChannelStatus::Closing);
    Ok(())
}
