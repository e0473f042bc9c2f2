//! Agreement envelopes
//!
//! Agreements are the plain-data envelopes participants exchange over an
//! opaque transport. An envelope carries the agreement details, the hashes
//! of the transactions the details deterministically produce, and the two
//! sides' detached signatures. A side signs all of its transactions at
//! once, so a side's signature set is present-or-absent as a unit: the
//! proposer's signatures are mandatory, and the presence of the
//! confirmer's signatures is what marks an agreement *authorized*.
//!
//! Transaction hashes are identity, not merely an anti-tamper check: a
//! receiver always rebuilds the transactions from the details and compares
//! hashes before trusting any signature.

use std::time::{Duration, SystemTime};

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::ledger::keys::{signature_hex, signer_hex};
use crate::ledger::{Asset, Transaction};
use crate::types::TransactionHash;

// ============================================================================
// Open agreements
// ============================================================================

/// Terms of a channel open, immutable once authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAgreementDetails {
    /// Minimum sequence age between declaration and close
    pub observation_period_time: Duration,
    /// Minimum ledger gap between declaration and close
    pub observation_period_ledger_gap: i64,
    /// Channel asset
    pub asset: Asset,
    /// Latest acceptance time of the formation transaction
    pub expires_at: SystemTime,
    /// Initiator-escrow sequence at which the formation transaction is
    /// valid; all declaration/close pairs are built from it
    pub starting_sequence: i64,
    /// Signer that proposed the open
    #[serde(with = "signer_hex")]
    pub proposing_signer: VerifyingKey,
    /// Signer that confirms the open
    #[serde(with = "signer_hex")]
    pub confirming_signer: VerifyingKey,
}

/// Hashes of the three transactions an open agreement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAgreementTransactionHashes {
    /// Hash of the initial declaration transaction
    pub declaration: TransactionHash,
    /// Hash of the initial close transaction
    pub close: TransactionHash,
    /// Hash of the formation transaction
    pub formation: TransactionHash,
}

/// One side's detached signatures over an open agreement's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAgreementSignatures {
    /// Signature over the initial declaration transaction
    #[serde(with = "signature_hex")]
    pub declaration: Signature,
    /// Signature over the initial close transaction
    #[serde(with = "signature_hex")]
    pub close: Signature,
    /// Signature over the formation transaction
    #[serde(with = "signature_hex")]
    pub formation: Signature,
}

impl OpenAgreementSignatures {
    /// Signs all three open transactions with one key.
    pub(crate) fn sign(
        declaration: &Transaction,
        close: &Transaction,
        formation: &Transaction,
        network_passphrase: &str,
        key: &SigningKey,
    ) -> Self {
        OpenAgreementSignatures {
            declaration: declaration.sign(network_passphrase, key),
            close: close.sign(network_passphrase, key),
            formation: formation.sign(network_passphrase, key),
        }
    }

    /// Returns true if every signature verifies under the signer against
    /// its transaction.
    pub(crate) fn verified_by(
        &self,
        declaration: &Transaction,
        close: &Transaction,
        formation: &Transaction,
        network_passphrase: &str,
        signer: &VerifyingKey,
    ) -> bool {
        declaration.verified_by(network_passphrase, signer, &self.declaration)
            && close.verified_by(network_passphrase, signer, &self.close)
            && formation.verified_by(network_passphrase, signer, &self.formation)
    }
}

/// An open agreement envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAgreement {
    /// Agreed open terms
    pub details: OpenAgreementDetails,
    /// Hashes of the transactions the details produce
    pub transaction_hashes: OpenAgreementTransactionHashes,
    /// Proposing side's signatures
    pub proposer_signatures: OpenAgreementSignatures,
    /// Confirming side's signatures; present once authorized
    pub confirmer_signatures: Option<OpenAgreementSignatures>,
}

impl OpenAgreement {
    /// Returns true once both sides have signed every transaction.
    pub fn is_authorized(&self) -> bool {
        self.confirmer_signatures.is_some()
    }
}

// ============================================================================
// Close agreements
// ============================================================================

/// Terms of a close agreement, identified by its iteration number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAgreementDetails {
    /// Minimum sequence age between declaration and close
    pub observation_period_time: Duration,
    /// Minimum ledger gap between declaration and close
    pub observation_period_ledger_gap: i64,
    /// Monotonically increasing version of the agreed balance
    pub iteration_number: i64,
    /// Amount owed from the initiator to the responder if positive, or from
    /// the responder to the initiator if negative
    pub balance: i64,
    /// Signer that proposed the agreement
    #[serde(with = "signer_hex")]
    pub proposing_signer: VerifyingKey,
    /// Signer that confirms the agreement
    #[serde(with = "signer_hex")]
    pub confirming_signer: VerifyingKey,
}

impl CloseAgreementDetails {
    /// Returns true if both observation periods are zero, the mark of a
    /// coordinated close.
    pub(crate) fn has_zero_observation_period(&self) -> bool {
        self.observation_period_time.is_zero() && self.observation_period_ledger_gap == 0
    }
}

/// Hashes of the two transactions a close agreement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAgreementTransactionHashes {
    /// Hash of the declaration transaction
    pub declaration: TransactionHash,
    /// Hash of the close transaction
    pub close: TransactionHash,
}

/// One side's detached signatures over a close agreement's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAgreementSignatures {
    /// Signature over the declaration transaction
    #[serde(with = "signature_hex")]
    pub declaration: Signature,
    /// Signature over the close transaction
    #[serde(with = "signature_hex")]
    pub close: Signature,
}

impl CloseAgreementSignatures {
    /// Signs both close-pair transactions with one key.
    pub(crate) fn sign(
        declaration: &Transaction,
        close: &Transaction,
        network_passphrase: &str,
        key: &SigningKey,
    ) -> Self {
        CloseAgreementSignatures {
            declaration: declaration.sign(network_passphrase, key),
            close: close.sign(network_passphrase, key),
        }
    }

    /// Returns true if both signatures verify under the signer against
    /// their transactions.
    pub(crate) fn verified_by(
        &self,
        declaration: &Transaction,
        close: &Transaction,
        network_passphrase: &str,
        signer: &VerifyingKey,
    ) -> bool {
        declaration.verified_by(network_passphrase, signer, &self.declaration)
            && close.verified_by(network_passphrase, signer, &self.close)
    }
}

/// A close agreement envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseAgreement {
    /// Agreed close terms
    pub details: CloseAgreementDetails,
    /// Hashes of the transactions the details produce
    pub transaction_hashes: CloseAgreementTransactionHashes,
    /// Proposing side's signatures
    pub proposer_signatures: CloseAgreementSignatures,
    /// Confirming side's signatures; present once authorized
    pub confirmer_signatures: Option<CloseAgreementSignatures>,
}

impl CloseAgreement {
    /// Returns true once both sides have signed both transactions.
    pub fn is_authorized(&self) -> bool {
        self.confirmer_signatures.is_some()
    }

    /// Returns true if the agreements describe the same terms and
    /// transactions, ignoring signatures.
    ///
    /// Two equivalent agreements may differ in signatures depending on who
    /// holds them and how far the exchange has progressed.
    pub fn is_equivalent(&self, other: &CloseAgreement) -> bool {
        self.details == other.details && self.transaction_hashes == other.transaction_hashes
    }
}
