//! Coordinated close protocol and close transaction accessors
//!
//! The close transactions signed during a payment remain valid as a
//! fall-back: either participant can submit the latest authorized
//! declaration and, once the observation period elapses, the close. The
//! coordinated path re-signs the latest agreement with zero observation
//! periods so settlement can happen immediately; whichever pair reaches the
//! ledger first closes the channel at the same balance.
//!
//! The steps for a coordinated close are:
//!
//! 1. A calls [`Channel::propose_close`] and relays the envelope
//! 2. B calls [`Channel::confirm_close`] to countersign and store
//! 3. A calls [`Channel::confirm_close`] to store the result
//! 4. A or B submits the new close transaction
//! 5. If either side declines or goes silent, the original pair from
//!    [`Channel::close_txs`] still settles after the observation period

use crate::channel::agreement::{
    CloseAgreement, CloseAgreementDetails, CloseAgreementSignatures,
    CloseAgreementTransactionHashes, OpenAgreementDetails,
};
use crate::channel::{amount_to_initiator, amount_to_responder, Channel};
use crate::errors::{ChannelError, Result};
use crate::ledger::{DecoratedSignature, Transaction};
use crate::txbuild::{self, CloseParams, DeclarationParams};
use crate::types::TransactionHash;

impl Channel {
    /// Builds the declaration and close transactions for a close agreement,
    /// returning each with its hash.
    pub(crate) fn build_close_txs(
        &self,
        open_details: &OpenAgreementDetails,
        details: &CloseAgreementDetails,
    ) -> Result<(TransactionHash, Transaction, TransactionHash, Transaction)> {
        let close_tx = txbuild::close(CloseParams {
            observation_period_time: details.observation_period_time,
            observation_period_ledger_gap: details.observation_period_ledger_gap,
            initiator_signer: self.initiator_signer(),
            responder_signer: self.responder_signer(),
            initiator_escrow: self.initiator_escrow_account().address,
            responder_escrow: self.responder_escrow_account().address,
            starting_sequence: open_details.starting_sequence,
            iteration_number: details.iteration_number,
            amount_to_initiator: amount_to_initiator(details.balance),
            amount_to_responder: amount_to_responder(details.balance),
            asset: open_details.asset.clone(),
        })?;
        let close_hash = close_tx.hash(&self.network_passphrase);

        let declaration_tx = txbuild::declaration(DeclarationParams {
            initiator_escrow: self.initiator_escrow_account().address,
            starting_sequence: open_details.starting_sequence,
            iteration_number: details.iteration_number,
            iteration_number_executed: 0,
            confirming_signer: details.confirming_signer,
            close_tx_hash: close_hash,
        })?;
        let declaration_hash = declaration_tx.hash(&self.network_passphrase);

        Ok((declaration_hash, declaration_tx, close_hash, close_tx))
    }

    /// Returns the declaration and close transactions of the latest
    /// authorized agreement, fully signed and ready to submit.
    ///
    /// # Returns
    /// * `Ok((Transaction, Transaction))` - The declaration and close
    ///   transactions with both sides' signatures attached
    /// * `Err(ChannelError::NotOpen)` - If no authorized open or close agreement exists
    /// * `Err(ChannelError::HashMismatch)` - If the rebuilt transactions do not match the agreement's hashes
    /// * `Err(ChannelError::InvalidSignature)` - If the confirmer's signatures are missing
    pub fn close_txs(&self) -> Result<(Transaction, Transaction)> {
        let open_details = self
            .open_agreement
            .as_ref()
            .filter(|oa| oa.is_authorized())
            .map(|oa| oa.details.clone())
            .ok_or(ChannelError::NotOpen)?;
        let agreement = self
            .latest_authorized_close_agreement
            .as_ref()
            .ok_or(ChannelError::NotOpen)?;

        let (declaration_hash, mut declaration_tx, close_hash, mut close_tx) =
            self.build_close_txs(&open_details, &agreement.details)?;
        if declaration_hash != agreement.transaction_hashes.declaration
            || close_hash != agreement.transaction_hashes.close
        {
            return Err(ChannelError::HashMismatch.into());
        }

        let confirmer_signatures =
            agreement.confirmer_signatures.ok_or(ChannelError::InvalidSignature)?;

        declaration_tx.attach_signature(DecoratedSignature::new(
            agreement.proposer_signatures.declaration,
            &agreement.details.proposing_signer,
        ));
        declaration_tx.attach_signature(DecoratedSignature::new(
            confirmer_signatures.declaration,
            &agreement.details.confirming_signer,
        ));
        // The confirming signer is an extra required signer on the
        // declaration for the close transaction hash payload.
        declaration_tx
            .attach_signature(DecoratedSignature::for_payload(confirmer_signatures.close, &close_hash));

        close_tx.attach_signature(DecoratedSignature::new(
            agreement.proposer_signatures.close,
            &agreement.details.proposing_signer,
        ));
        close_tx.attach_signature(DecoratedSignature::new(
            confirmer_signatures.close,
            &agreement.details.confirming_signer,
        ));

        Ok((declaration_tx, close_tx))
    }

    /// Proposes that the latest authorized agreement be re-signed with zero
    /// observation periods so it can be submitted without waiting.
    ///
    /// Proposing a coordinated close disables further payments on this
    /// side; the peer's side is disabled when it confirms.
    ///
    /// # Returns
    /// * `Ok(CloseAgreement)` - The zero-delay envelope carrying the local
    ///   side's signatures
    /// * `Err(ChannelError::PaymentInProgress)` - If an unfinished payment exists
    /// * `Err(ChannelError::NotOpen)` - If the channel has not completed open and formation
    /// * `Err(ChannelError::CoordinatedCloseAuthorized)` - If a coordinated close has already been accepted
    pub fn propose_close(&mut self) -> Result<CloseAgreement> {
        if self.latest_unauthorized_close_agreement.is_some() {
            return Err(ChannelError::PaymentInProgress.into());
        }
        if !self.is_open() {
            return Err(ChannelError::NotOpen.into());
        }
        if self.coordinated_close_authorized() {
            return Err(ChannelError::CoordinatedCloseAuthorized.into());
        }

        let open_details = self
            .open_agreement
            .as_ref()
            .map(|oa| oa.details.clone())
            .ok_or(ChannelError::NotOpen)?;
        let latest = self
            .latest_authorized_close_agreement
            .as_ref()
            .ok_or(ChannelError::NotOpen)?;

        let details = CloseAgreementDetails {
            observation_period_time: std::time::Duration::ZERO,
            observation_period_ledger_gap: 0,
            iteration_number: latest.details.iteration_number,
            balance: latest.details.balance,
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

    /// Confirms a coordinated-close envelope, countersigning if the local
    /// participant is the confirmer and replacing the latest authorized
    /// agreement with the zero-delay version once fully signed.
    ///
    /// An envelope identical to the latest authorized agreement is always
    /// accepted, so either valid pair can settle the channel at the same
    /// balance.
    ///
    /// # Arguments
    /// * `envelope` - The coordinated-close envelope received from the peer
    ///
    /// # Returns
    /// * `Ok(CloseAgreement)` - The envelope including the local side's
    ///   signatures, promoted to the latest authorized agreement
    /// * `Err(ChannelError::NotOpen)` - If the channel has not completed open and formation
    /// * `Err(ChannelError::CloseAgreementMismatch)` - If the iteration number or balance differs from the latest authorized agreement
    /// * `Err(ChannelError::ObservationPeriodMismatch)` - If the observation periods are not zero
    /// * `Err(ChannelError::SignerNotRecognized)` - If the signer pair is not the channel's two known signers
    /// * `Err(ChannelError::HashMismatch)` - If the rebuilt transactions do not match the envelope's hashes
    /// * `Err(ChannelError::InvalidSignature)` - If a carried signature does not verify, or the envelope is unconfirmed and the local participant is not the confirming signer
    pub fn confirm_close(&mut self, envelope: CloseAgreement) -> Result<CloseAgreement> {
        self.validate_close(&envelope)?;

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
            None => {
                if envelope.details.confirming_signer != self.local_signer_key() {
                    // As the proposer we signed at proposal time; only the
                    // confirmer can complete the agreement.
                    return Err(ChannelError::InvalidSignature.into());
                }
                let confirmer_signatures = CloseAgreementSignatures::sign(
                    &declaration_tx,
                    &close_tx,
                    &self.network_passphrase,
                    &self.local_signer,
                );
                CloseAgreement { confirmer_signatures: Some(confirmer_signatures), ..envelope }
            }
        };

        self.latest_authorized_close_agreement = Some(envelope.clone());
        self.latest_unauthorized_close_agreement = None;
        Ok(envelope)
    }

    fn validate_close(&self, envelope: &CloseAgreement) -> Result<()> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen.into());
        }
        let latest = self
            .latest_authorized_close_agreement
            .as_ref()
            .ok_or(ChannelError::NotOpen)?;
        if envelope.details.iteration_number != latest.details.iteration_number
            || envelope.details.balance != latest.details.balance
        {
            return Err(ChannelError::CloseAgreementMismatch.into());
        }
        if !envelope.details.has_zero_observation_period() {
            return Err(ChannelError::ObservationPeriodMismatch.into());
        }
        if !self.signers_are_known(
            &envelope.details.proposing_signer,
            &envelope.details.confirming_signer,
        ) {
            return Err(ChannelError::SignerNotRecognized.into());
        }
        Ok(())
    }
}
