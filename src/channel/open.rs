//! Open protocol
//!
//! Three-step signature exchange that produces the authorized open
//! agreement and the formation transaction:
//!
//! 1. The initiator calls [`Channel::propose_open`] and sends the envelope.
//! 2. The responder calls [`Channel::confirm_open`], countersigning, and
//!    returns the envelope.
//! 3. The initiator calls [`Channel::confirm_open`] to verify and store the
//!    fully signed agreement.
//!
//! Authorization alone does not unlock payments: the formation transaction
//! must also execute on the ledger and be validated by ingestion.
//!
//! A successful open installs an initial close agreement at iteration zero
//! with balance zero, signed by both sides as part of the open envelope. It
//! anchors the agreement chain: the first payment advances it to iteration
//! one, whose declaration occupies the first sequence slot after formation.

use std::time::{Duration, SystemTime};

use crate::channel::agreement::{
    CloseAgreement, CloseAgreementDetails, CloseAgreementSignatures,
    CloseAgreementTransactionHashes, OpenAgreement, OpenAgreementDetails,
    OpenAgreementSignatures, OpenAgreementTransactionHashes,
};
use crate::channel::Channel;
use crate::errors::{ChannelError, Result};
use crate::ledger::{Asset, DecoratedSignature, Transaction};
use crate::txbuild::{self, FormationParams};

/// Caller-supplied parameters for proposing a channel open.
#[derive(Debug, Clone)]
pub struct OpenParams {
    /// Minimum sequence age between declaration and close
    pub observation_period_time: Duration,
    /// Minimum ledger gap between declaration and close
    pub observation_period_ledger_gap: i64,
    /// Channel asset
    pub asset: Asset,
    /// Latest acceptance time of the formation transaction
    pub expires_at: SystemTime,
}

impl Channel {
    /// Proposes opening the channel, producing the open envelope to relay
    /// to the peer.
    ///
    /// Signs the initial declaration, the initial close and the formation
    /// transaction under the local key and assigns the starting sequence
    /// from the initiator escrow's current sequence. The local view of the
    /// open becomes proposed.
    ///
    /// # Arguments
    /// * `params` - Observation periods, asset and expiry of the proposed
    ///   channel
    ///
    /// # Returns
    /// * `Ok(OpenAgreement)` - The proposed envelope carrying the local
    ///   side's signatures
    /// * `Err(ChannelError::OpenAlreadyInProgress)` - If an open agreement already exists for this channel
    /// * `Err(ChannelError::OpenExpired)` - If `expires_at` is in the past or beyond the configured maximum open expiry
    /// * `Err(TxBuildError::SequenceOverflow)` - If the starting sequence cannot be computed
    pub fn propose_open(&mut self, params: OpenParams) -> Result<OpenAgreement> {
        if self.open_agreement.is_some() {
            return Err(ChannelError::OpenAlreadyInProgress.into());
        }
        let now = SystemTime::now();
        if params.expires_at < now || params.expires_at > now + self.max_open_expiry {
            return Err(ChannelError::OpenExpired.into());
        }

        let starting_sequence = self
            .initiator_escrow_account()
            .sequence_number
            .checked_add(1)
            .ok_or(crate::errors::TxBuildError::SequenceOverflow)?;

        let details = OpenAgreementDetails {
            observation_period_time: params.observation_period_time,
            observation_period_ledger_gap: params.observation_period_ledger_gap,
            asset: params.asset,
            expires_at: params.expires_at,
            starting_sequence,
            proposing_signer: self.local_signer_key(),
            confirming_signer: self.remote_signer,
        };

        let (transaction_hashes, declaration_tx, close_tx, formation_tx) =
            self.open_txs(&details)?;
        let proposer_signatures = OpenAgreementSignatures::sign(
            &declaration_tx,
            &close_tx,
            &formation_tx,
            &self.network_passphrase,
            &self.local_signer,
        );

        let agreement = OpenAgreement {
            details,
            transaction_hashes,
            proposer_signatures,
            confirmer_signatures: None,
        };
        self.open_agreement = Some(agreement.clone());
        Ok(agreement)
    }

    /// Confirms an open envelope received from the peer.
    ///
    /// Re-validates the details against any previously seen proposal,
    /// rebuilds the transactions, verifies every signature present, and
    /// produces any missing local signature. Once both sides have signed
    /// everything the agreement is authorized and stored, together with the
    /// initial close agreement it implies. The responder calls this once to
    /// countersign, the initiator once more to verify and store.
    ///
    /// # Arguments
    /// * `envelope` - The open envelope received from the peer
    ///
    /// # Returns
    /// * `Ok(OpenAgreement)` - The envelope including the local side's
    ///   signatures, authorized once both sides have signed
    /// * `Err(ChannelError::OpenAgreementMismatch)` - If the details differ from a previously seen proposal, or the starting sequence is not the initiator escrow's next sequence
    /// * `Err(ChannelError::SignerNotRecognized)` - If the signer pair is not the channel's two known signers
    /// * `Err(ChannelError::OpenExpired)` - If the expiry is in the past or beyond the configured maximum open expiry
    /// * `Err(ChannelError::HashMismatch)` - If the rebuilt transactions do not match the envelope's hashes
    /// * `Err(ChannelError::InvalidSignature)` - If a carried signature does not verify, or the envelope is unconfirmed and the local participant is not the confirming signer
    pub fn confirm_open(&mut self, envelope: OpenAgreement) -> Result<OpenAgreement> {
        self.validate_open(&envelope.details)?;

        let (rebuilt_hashes, declaration_tx, close_tx, formation_tx) =
            self.open_txs(&envelope.details)?;
        if rebuilt_hashes != envelope.transaction_hashes {
            return Err(ChannelError::HashMismatch.into());
        }

        if !envelope.proposer_signatures.verified_by(
            &declaration_tx,
            &close_tx,
            &formation_tx,
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
                    &formation_tx,
                    &self.network_passphrase,
                    &envelope.details.confirming_signer,
                ) {
                    return Err(ChannelError::InvalidSignature.into());
                }
                envelope
            }
            None => {
                // Only the named confirming signer can complete the
                // agreement; the proposer has already signed.
                if envelope.details.confirming_signer != self.local_signer_key() {
                    return Err(ChannelError::InvalidSignature.into());
                }
                let confirmer_signatures = OpenAgreementSignatures::sign(
                    &declaration_tx,
                    &close_tx,
                    &formation_tx,
                    &self.network_passphrase,
                    &self.local_signer,
                );
                OpenAgreement { confirmer_signatures: Some(confirmer_signatures), ..envelope }
            }
        };

        self.latest_authorized_close_agreement = Some(initial_close_agreement(&envelope));
        self.open_agreement = Some(envelope.clone());
        Ok(envelope)
    }

    /// Returns the fully signed formation transaction, ready to submit.
    ///
    /// # Returns
    /// * `Ok(Transaction)` - The formation transaction with both sides'
    ///   signatures attached
    /// * `Err(ChannelError::NotOpen)` - If no authorized open agreement exists
    /// * `Err(ChannelError::HashMismatch)` - If the rebuilt transactions do not match the agreement's hashes
    /// * `Err(ChannelError::InvalidSignature)` - If the confirmer's signatures are missing
    pub fn open_tx(&self) -> Result<Transaction> {
        let agreement = self
            .open_agreement
            .as_ref()
            .filter(|oa| oa.is_authorized())
            .ok_or(ChannelError::NotOpen)?;

        let (rebuilt_hashes, _, _, mut formation_tx) = self.open_txs(&agreement.details)?;
        if rebuilt_hashes != agreement.transaction_hashes {
            return Err(ChannelError::HashMismatch.into());
        }

        let confirmer_signatures =
            agreement.confirmer_signatures.ok_or(ChannelError::InvalidSignature)?;
        formation_tx.attach_signature(DecoratedSignature::new(
            agreement.proposer_signatures.formation,
            &agreement.details.proposing_signer,
        ));
        formation_tx.attach_signature(DecoratedSignature::new(
            confirmer_signatures.formation,
            &agreement.details.confirming_signer,
        ));
        Ok(formation_tx)
    }

    fn validate_open(&self, details: &OpenAgreementDetails) -> Result<()> {
        match &self.open_agreement {
            Some(existing) => {
                if *details != existing.details {
                    return Err(ChannelError::OpenAgreementMismatch.into());
                }
            }
            None => {
                let expected = self.initiator_escrow_account().sequence_number + 1;
                if details.starting_sequence != expected {
                    return Err(ChannelError::OpenAgreementMismatch.into());
                }
            }
        }
        if !self.signers_are_known(&details.proposing_signer, &details.confirming_signer) {
            return Err(ChannelError::SignerNotRecognized.into());
        }
        let now = SystemTime::now();
        if details.expires_at < now || details.expires_at > now + self.max_open_expiry {
            return Err(ChannelError::OpenExpired.into());
        }
        Ok(())
    }

    /// Builds the three open transactions and their hashes from open
    /// details.
    pub(crate) fn open_txs(
        &self,
        details: &OpenAgreementDetails,
    ) -> Result<(OpenAgreementTransactionHashes, Transaction, Transaction, Transaction)> {
        let close_details = initial_close_details(details);
        let (declaration_hash, declaration_tx, close_hash, close_tx) =
            self.build_close_txs(details, &close_details)?;

        let formation_tx = txbuild::formation(FormationParams {
            initiator_signer: self.initiator_signer(),
            responder_signer: self.responder_signer(),
            initiator_escrow: self.initiator_escrow_account().address,
            responder_escrow: self.responder_escrow_account().address,
            starting_sequence: details.starting_sequence,
            asset: details.asset.clone(),
            expires_at: details.expires_at,
        })?;
        let formation_hash = formation_tx.hash(&self.network_passphrase);

        Ok((
            OpenAgreementTransactionHashes {
                declaration: declaration_hash,
                close: close_hash,
                formation: formation_hash,
            },
            declaration_tx,
            close_tx,
            formation_tx,
        ))
    }
}

/// The close details implied by an open agreement: iteration zero, balance
/// zero, the open's observation periods and signers.
fn initial_close_details(details: &OpenAgreementDetails) -> CloseAgreementDetails {
    CloseAgreementDetails {
        observation_period_time: details.observation_period_time,
        observation_period_ledger_gap: details.observation_period_ledger_gap,
        iteration_number: 0,
        balance: 0,
        proposing_signer: details.proposing_signer,
        confirming_signer: details.confirming_signer,
    }
}

/// The initial close agreement carried inside an authorized open envelope.
fn initial_close_agreement(agreement: &OpenAgreement) -> CloseAgreement {
    CloseAgreement {
        details: initial_close_details(&agreement.details),
        transaction_hashes: CloseAgreementTransactionHashes {
            declaration: agreement.transaction_hashes.declaration,
            close: agreement.transaction_hashes.close,
        },
        proposer_signatures: CloseAgreementSignatures {
            declaration: agreement.proposer_signatures.declaration,
            close: agreement.proposer_signatures.close,
        },
        confirmer_signatures: agreement.confirmer_signatures.map(|s| CloseAgreementSignatures {
            declaration: s.declaration,
            close: s.close,
        }),
    }
}
