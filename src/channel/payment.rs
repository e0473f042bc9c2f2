//! Payment protocol
//!
//! Iterated signature exchange that advances the authorized close agreement
//! on every payment. The exchange is strictly serial: at most one
//! unauthorized agreement exists at a time, and the next agreement's
//! iteration number is always the latest authorized iteration plus one.
//!
//! The full relay is proposer → confirmer → proposer → confirmer:
//!
//! 1. Proposer calls [`Channel::propose_payment`]
//! 2. Confirmer calls [`Channel::confirm_payment`], countersigning
//! 3. Proposer calls [`Channel::confirm_payment`], promoting the agreement
//! 4. Confirmer calls [`Channel::confirm_payment`] again, a no-op accepting
//!    the final envelope
//!
//! Proposing is paying: a proposer can only move the balance *away* from
//! themselves, so no participant can be tricked into countersigning an
//! agreement that takes their funds.

use crate::channel::agreement::{
    CloseAgreement, CloseAgreementDetails, CloseAgreementSignatures,
    CloseAgreementTransactionHashes,
};
use crate::channel::{amount_to_initiator, amount_to_responder, Channel};
use crate::errors::{ChannelError, Result};
use crate::ledger::Asset;

/// An asset-tagged payment amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    /// Asset being paid
    pub asset: Asset,
    /// Amount being paid; must be positive
    pub amount: i64,
}

impl Channel {
    /// Proposes a payment of the given amount from the local participant to
    /// the remote participant, producing the envelope to relay to the peer.
    ///
    /// The new agreement is built at the next iteration number and signed
    /// under the local key; it stays unauthorized until the peer confirms.
    ///
    /// # Arguments
    /// * `amount` - Asset-tagged amount to pay; must be positive and in the
    ///   channel's asset
    ///
    /// # Returns
    /// * `Ok(CloseAgreement)` - The proposed envelope carrying the local
    ///   side's signatures
    /// * `Err(ChannelError::NotOpen)` - If the channel has not completed open and formation
    /// * `Err(ChannelError::CoordinatedCloseAuthorized)` - If a coordinated close has been accepted
    /// * `Err(ChannelError::CoordinatedClosePending)` - If a coordinated close has been proposed
    /// * `Err(ChannelError::PaymentInProgress)` - If an unfinished payment exists
    /// * `Err(ChannelError::NonPositiveAmount)` - If the amount is zero or negative
    /// * `Err(ChannelError::AssetMismatch)` - If the amount's asset differs from the channel asset
    /// * `Err(ChannelError::BalanceOverflow)` - If the new balance would overflow
    /// * `Err(ChannelError::Underfunded)` - If the local escrow cannot cover the resulting obligation; the caller may refresh the balance and retry
    pub fn propose_payment(&mut self, amount: Amount) -> Result<CloseAgreement> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen.into());
        }
        if self.coordinated_close_authorized() {
            return Err(ChannelError::CoordinatedCloseAuthorized.into());
        }
        if self.coordinated_close_proposed() {
            return Err(ChannelError::CoordinatedClosePending.into());
        }
        if self.latest_unauthorized_close_agreement.is_some() {
            return Err(ChannelError::PaymentInProgress.into());
        }
        if amount.amount <= 0 {
            return Err(ChannelError::NonPositiveAmount.into());
        }
        let open_details = self
            .open_agreement
            .as_ref()
            .map(|oa| oa.details.clone())
            .ok_or(ChannelError::NotOpen)?;
        if amount.asset != open_details.asset {
            return Err(ChannelError::AssetMismatch {
                got: amount.asset,
                want: open_details.asset,
            }
            .into());
        }

        // The proposer pays: the balance moves away from the local side.
        let new_balance = if self.initiator {
            self.balance().checked_add(amount.amount)
        } else {
            self.balance().checked_sub(amount.amount)
        }
        .ok_or(ChannelError::BalanceOverflow)?;

        let owed_by_local = if self.initiator {
            amount_to_responder(new_balance)
        } else {
            amount_to_initiator(new_balance)
        };
        if owed_by_local > self.local_escrow_account.balance {
            return Err(ChannelError::Underfunded.into());
        }

        let latest = self
            .latest_authorized_close_agreement
            .as_ref()
            .ok_or(ChannelError::NotOpen)?;
        let details = CloseAgreementDetails {
            observation_period_time: latest.details.observation_period_time,
            observation_period_ledger_gap: latest.details.observation_period_ledger_gap,
            iteration_number: self.next_iteration_number(),
            balance: new_balance,
            proposing_signer: self.local_signer_key(),
            confirming_signer: self.remote_signer,
        };

        let (declaration_hash, declaration_tx, close_hash, close_tx) =
            self.build_close_txs(&open_details, &details)?;
        let proposer_signatures = CloseAgreementSignatures::sign(
            &declaration_tx,
            &close_tx,
            &self.network_passphrase,
            &self.local_signer,
        );

        let agreement = CloseAgreement {
            details,
            transaction_hashes: CloseAgreementTransactionHashes {
                declaration: declaration_hash,
                close: close_hash,
            },
            proposer_signatures,
            confirmer_signatures: None,
        };
        self.latest_unauthorized_close_agreement = Some(agreement.clone());
        Ok(agreement)
    }

    /// Confirms a payment envelope.
    ///
    /// The proposer calls this once when the countersigned envelope comes
    /// back; the confirmer calls it up to twice, first to countersign and
    /// promote, then as a no-op on the final relay. Confirming an envelope
    /// identical to the latest authorized agreement returns the authorized
    /// agreement unchanged, so retried deliveries are harmless.
    ///
    /// # Arguments
    /// * `envelope` - The payment envelope received from the peer, or the
    ///   harvested in-flight agreement during ingestion
    ///
    /// # Returns
    /// * `Ok(CloseAgreement)` - The envelope including the local side's
    ///   signatures, authorized and promoted once both sides have signed
    /// * `Err(ChannelError::NotOpen)` - If the channel has not completed open and formation
    /// * `Err(ChannelError::CoordinatedCloseAuthorized)` - If a coordinated close has been accepted
    /// * `Err(ChannelError::CoordinatedClosePending)` - If a coordinated close has been proposed
    /// * `Err(ChannelError::IterationMismatch)` - If the iteration number is not the next expected
    /// * `Err(ChannelError::DifferentPaymentInProgress)` - If a different unauthorized agreement exists for the same iteration
    /// * `Err(ChannelError::ObservationPeriodMismatch)` - If the observation periods differ from the channel's configured periods
    /// * `Err(ChannelError::SignerNotRecognized)` - If the signer pair is not the channel's two known signers
    /// * `Err(ChannelError::PaymentToProposer)` - If the balance change favors the proposing side
    /// * `Err(ChannelError::Underfunded)` - If either escrow's observed balance cannot cover its obligation; the caller may refresh balances and retry
    /// * `Err(ChannelError::HashMismatch)` - If the rebuilt transactions do not match the envelope's hashes
    /// * `Err(ChannelError::InvalidSignature)` - If a carried signature does not verify
    pub fn confirm_payment(&mut self, envelope: CloseAgreement) -> Result<CloseAgreement> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen.into());
        }
        // Network retries and the final relay leg deliver agreements that
        // are already authorized; accept them without re-validating.
        if let Some(latest) = &self.latest_authorized_close_agreement {
            if envelope.is_equivalent(latest) {
                return Ok(latest.clone());
            }
        }
        self.validate_payment(&envelope)?;

        let open_details = self
            .open_agreement
            .as_ref()
            .map(|oa| oa.details.clone())
            .ok_or(ChannelError::NotOpen)?;
        let (declaration_hash, declaration_tx, close_hash, close_tx) =
            self.build_close_txs(&open_details, &envelope.details)?;
        if declaration_hash != envelope.transaction_hashes.declaration
            || close_hash != envelope.transaction_hashes.close
        {
            return Err(ChannelError::HashMismatch.into());
        }

        if !envelope.proposer_signatures.verified_by(
            &declaration_tx,
            &close_tx,
            &self.network_passphrase,
            &envelope.details.proposing_signer,
        ) {
            return Err(ChannelError::InvalidSignature.into());
        }

        let envelope = match envelope.confirmer_signatures {
            Some(confirmer_signatures) => {
                if !confirmer_signatures.verified_by(
                    &declaration_tx,
                    &close_tx,
                    &self.network_passphrase,
                    &envelope.details.confirming_signer,
                ) {
                    return Err(ChannelError::InvalidSignature.into());
                }
                envelope
            }
            None if envelope.details.confirming_signer == self.local_signer_key() => {
                let confirmer_signatures = CloseAgreementSignatures::sign(
                    &declaration_tx,
                    &close_tx,
                    &self.network_passphrase,
                    &self.local_signer,
                );
                CloseAgreement { confirmer_signatures: Some(confirmer_signatures), ..envelope }
            }
            None => {
                // The local side proposed and the peer has not signed yet;
                // keep the agreement in flight unchanged.
                self.latest_unauthorized_close_agreement = Some(envelope.clone());
                return Ok(envelope);
            }
        };

        self.latest_authorized_close_agreement = Some(envelope.clone());
        self.latest_unauthorized_close_agreement = None;
        Ok(envelope)
    }

    fn validate_payment(&self, envelope: &CloseAgreement) -> Result<()> {
        if self.coordinated_close_authorized() {
            return Err(ChannelError::CoordinatedCloseAuthorized.into());
        }
        if self.coordinated_close_proposed() {
            return Err(ChannelError::CoordinatedClosePending.into());
        }

        let got = envelope.details.iteration_number;
        let want = self.next_iteration_number();
        if got != want {
            return Err(ChannelError::IterationMismatch { got, want }.into());
        }

        if let Some(unauthorized) = &self.latest_unauthorized_close_agreement {
            if !envelope.is_equivalent(unauthorized) {
                return Err(ChannelError::DifferentPaymentInProgress.into());
            }
        }

        let latest = self
            .latest_authorized_close_agreement
            .as_ref()
            .ok_or(ChannelError::NotOpen)?;
        if envelope.details.observation_period_time != latest.details.observation_period_time
            || envelope.details.observation_period_ledger_gap
                != latest.details.observation_period_ledger_gap
        {
            return Err(ChannelError::ObservationPeriodMismatch.into());
        }

        if !self.signers_are_known(
            &envelope.details.proposing_signer,
            &envelope.details.confirming_signer,
        ) {
            return Err(ChannelError::SignerNotRecognized.into());
        }

        // A payment must move the balance away from its proposer. The
        // balance is owed initiator → responder when positive, so growth
        // favors the responder and shrinkage favors the initiator.
        let proposer_is_initiator = envelope.details.proposing_signer == self.initiator_signer();
        let new_balance = envelope.details.balance;
        let favors_initiator = new_balance < latest.details.balance;
        let favors_responder = new_balance > latest.details.balance;
        if (proposer_is_initiator && favors_initiator)
            || (!proposer_is_initiator && favors_responder)
        {
            return Err(ChannelError::PaymentToProposer.into());
        }

        if amount_to_responder(new_balance) > self.initiator_escrow_account().balance
            || amount_to_initiator(new_balance) > self.responder_escrow_account().balance
        {
            return Err(ChannelError::Underfunded.into());
        }

        Ok(())
    }
}
