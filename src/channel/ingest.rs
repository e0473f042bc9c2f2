//! Ingestion of observed on-ledger transactions
//!
//! The caller feeds every transaction it sees on the ledger, together with
//! the observed result and result metadata, into [`Channel::ingest_tx`].
//! Ingestion keeps the escrow caches current, validates the formation
//! transaction, harvests confirmer signatures off published declarations,
//! and detects closure.
//!
//! Formation validation is the only moment the core verifies that the peer
//! actually committed to the protocol on-ledger, so the full schedule of
//! expected ledger changes is checked: sequence, thresholds, signer
//! weights, and trustlines for non-native assets.

use crate::channel::agreement::CloseAgreementSignatures;
use crate::channel::Channel;
use crate::errors::{ChannelError, Result};
use crate::ledger::{
    AccountEntry, LedgerEntryUpdate, Transaction, TransactionResult, TransactionResultMeta,
    TrustlineEntry,
};
use crate::txbuild::ESCROW_THRESHOLDS;

impl Channel {
    /// Ingests a transaction observed on the ledger, updating channel state
    /// where the transaction relates to the channel.
    ///
    /// Unrelated transactions are ignored. Transactions that should relate
    /// to the channel but do not validate are fatal for the call.
    ///
    /// # Arguments
    /// * `tx` - The observed transaction
    /// * `result` - The observed execution outcome
    /// * `result_meta` - The ledger entries the transaction updated
    ///
    /// # Returns
    /// * `Ok(())` - The channel state reflects the observation
    /// * `Err(ChannelError::InvalidFormation)` - If an observed formation transaction failed or its ledger changes do not match the agreement
    /// * `Err(ChannelError::InvalidSignature)` - If a declaration matching the in-flight agreement carries no usable confirmer signatures
    /// * Any [`Channel::confirm_payment`] error - If promoting a harvested in-flight agreement fails
    pub fn ingest_tx(
        &mut self,
        tx: &Transaction,
        result: &TransactionResult,
        result_meta: &TransactionResultMeta,
    ) -> Result<()> {
        self.ingest_tx_to_update_initiator_escrow_sequence(tx);
        self.ingest_tx_to_authorize_unauthorized_agreement(tx)?;
        self.ingest_tx_meta_to_update_balances(result_meta);
        self.ingest_formation_tx(tx, result, result_meta)?;
        self.ingest_tx_to_detect_closure(tx);
        Ok(())
    }

    /// Tracks the initiator escrow sequence from any transaction it
    /// sources.
    fn ingest_tx_to_update_initiator_escrow_sequence(&mut self, tx: &Transaction) {
        if tx.source_account != self.initiator_escrow_account().address {
            return;
        }
        self.set_initiator_escrow_sequence(tx.sequence);
    }

    /// Authorizes the in-flight agreement from signatures attached to its
    /// published declaration.
    ///
    /// A proposer that never received the confirmer's reply, but observes
    /// the confirmer publishing the declaration, harvests the confirmer's
    /// signatures off the transaction and can still close at the authorized
    /// balance. A declaration that matches the in-flight agreement but does
    /// not carry usable confirmer signatures is an error.
    fn ingest_tx_to_authorize_unauthorized_agreement(&mut self, tx: &Transaction) -> Result<()> {
        if tx.source_account != self.initiator_escrow_account().address {
            return Ok(());
        }
        let Some(open_details) = self.open_agreement.as_ref().map(|oa| oa.details.clone()) else {
            return Ok(());
        };
        let Some(unauthorized) = self.latest_unauthorized_close_agreement.clone() else {
            return Ok(());
        };

        let (declaration_hash, _, close_hash, _) =
            self.build_close_txs(&open_details, &unauthorized.details)?;
        if tx.hash(&self.network_passphrase) != declaration_hash {
            return Ok(());
        }

        let mut declaration_signature = None;
        let mut close_signature = None;
        for attached in tx.signatures() {
            if declaration_signature.is_none()
                && self
                    .remote_signer
                    .verify_strict(declaration_hash.as_bytes(), &attached.signature)
                    .is_ok()
            {
                declaration_signature = Some(attached.signature);
            }
            if close_signature.is_none()
                && self
                    .remote_signer
                    .verify_strict(close_hash.as_bytes(), &attached.signature)
                    .is_ok()
            {
                close_signature = Some(attached.signature);
            }
        }
        let (Some(declaration), Some(close)) = (declaration_signature, close_signature) else {
            return Err(ChannelError::InvalidSignature.into());
        };

        let mut agreement = unauthorized;
        agreement.confirmer_signatures =
            Some(CloseAgreementSignatures { declaration, close });
        self.confirm_payment(agreement)?;
        Ok(())
    }

    /// Updates the escrow balance caches from observed ledger-entry
    /// updates.
    fn ingest_tx_meta_to_update_balances(&mut self, result_meta: &TransactionResultMeta) {
        let Some(asset) = self.open_agreement.as_ref().map(|oa| oa.details.asset.clone()) else {
            return;
        };

        for update in &result_meta.updates {
            let (address, balance) = match update {
                LedgerEntryUpdate::Account(entry) if asset.is_native() => {
                    (entry.address, entry.balance)
                }
                LedgerEntryUpdate::Trustline(entry)
                    if !asset.is_native() && entry.asset == asset =>
                {
                    (entry.account, entry.balance)
                }
                _ => continue,
            };
            if address == self.local_escrow_account.address {
                self.local_escrow_account.balance = balance;
            } else if address == self.remote_escrow_account.address {
                self.remote_escrow_account.balance = balance;
            }
        }
    }

    /// Validates an observed formation transaction and unlocks the channel.
    fn ingest_formation_tx(
        &mut self,
        tx: &Transaction,
        result: &TransactionResult,
        result_meta: &TransactionResultMeta,
    ) -> Result<()> {
        let Some(open) = self.open_agreement.as_ref().filter(|oa| oa.is_authorized()) else {
            return Ok(());
        };
        if tx.hash(&self.network_passphrase) != open.transaction_hashes.formation {
            return Ok(());
        }
        if !result.successful {
            return Err(ChannelError::InvalidFormation("transaction was not successful").into());
        }

        let initiator_address = self.initiator_escrow_account().address;
        let responder_address = self.responder_escrow_account().address;

        let mut initiator_entry: Option<&AccountEntry> = None;
        let mut responder_entry: Option<&AccountEntry> = None;
        let mut initiator_trustline: Option<&TrustlineEntry> = None;
        let mut responder_trustline: Option<&TrustlineEntry> = None;
        for update in &result_meta.updates {
            match update {
                LedgerEntryUpdate::Account(entry) => {
                    if entry.address == initiator_address {
                        initiator_entry = Some(entry);
                    } else if entry.address == responder_address {
                        responder_entry = Some(entry);
                    }
                }
                LedgerEntryUpdate::Trustline(entry) => {
                    if entry.account == initiator_address {
                        initiator_trustline = Some(entry);
                    } else if entry.account == responder_address {
                        responder_trustline = Some(entry);
                    }
                }
            }
        }

        let initiator_entry = initiator_entry
            .ok_or(ChannelError::InvalidFormation("initiator escrow account not updated"))?;
        let responder_entry = responder_entry
            .ok_or(ChannelError::InvalidFormation("responder escrow account not updated"))?;

        if initiator_entry.sequence != open.details.starting_sequence {
            return Err(ChannelError::InvalidFormation(
                "incorrect initiator escrow sequence number",
            )
            .into());
        }

        let initiator_signer = self.initiator_signer();
        let responder_signer = self.responder_signer();
        for entry in [initiator_entry, responder_entry] {
            if entry.thresholds != ESCROW_THRESHOLDS {
                return Err(
                    ChannelError::InvalidFormation("incorrect escrow account thresholds").into()
                );
            }
            let initiator_signer_found =
                entry.signers.iter().any(|(key, weight)| *key == initiator_signer && *weight == 1);
            let responder_signer_found =
                entry.signers.iter().any(|(key, weight)| *key == responder_signer && *weight == 1);
            if !initiator_signer_found || !responder_signer_found || entry.signers.len() != 2 {
                return Err(
                    ChannelError::InvalidFormation("incorrect escrow account signers").into()
                );
            }
        }

        if open.details.asset.is_native() {
            if initiator_trustline.is_some() || responder_trustline.is_some() {
                return Err(ChannelError::InvalidFormation(
                    "extraneous trustline found for native asset channel",
                )
                .into());
            }
        } else {
            for trustline in [initiator_trustline, responder_trustline] {
                let trustline = trustline
                    .ok_or(ChannelError::InvalidFormation("missing escrow trustline"))?;
                if trustline.asset != open.details.asset {
                    return Err(ChannelError::InvalidFormation(
                        "incorrect trustline asset for non-native asset channel",
                    )
                    .into());
                }
            }
        }

        self.open_executed_and_validated = true;
        Ok(())
    }

    /// Flags closure from declaration and close transactions observed on
    /// the initiator escrow's sequence slots.
    fn ingest_tx_to_detect_closure(&mut self, tx: &Transaction) {
        let Some(open) = &self.open_agreement else {
            return;
        };
        if tx.source_account != self.initiator_escrow_account().address {
            return;
        }
        let Some(delta) = tx.sequence.checked_sub(open.details.starting_sequence) else {
            return;
        };
        if delta < 1 {
            return;
        }
        if delta % 2 == 1 {
            // Declarations occupy the odd slots of each iteration.
            self.observed_declaration_iteration = Some((delta + 1) / 2);
        } else {
            self.observed_close = true;
        }
    }
}
