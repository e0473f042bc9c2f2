//! Deterministic transaction representation
//!
//! Transactions are plain data: a source account, a sequence slot, minimum
//! sequence-age constraints carrying the observation period, an optional
//! extra payload signer, and a list of operations. Hashing covers the
//! canonical encoding of everything except the attached signatures, mixed
//! with the network passphrase, so two channels on different networks can
//! never share a signable hash.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::ledger::asset::Asset;
use crate::ledger::keys::{signer_hint, AccountId};
use crate::types::{TransactionHash, TX_DOMAIN_TAG};

/// A signer-weight update inside a [`Operation::SetOptions`] operation.
///
/// Weight zero removes the signer from the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignerUpdate {
    /// Signer key being added, reweighted or removed
    pub key: VerifyingKey,
    /// New signer weight
    pub weight: u32,
}

/// An extra required signer whose signature must cover an arbitrary payload
/// rather than the transaction hash.
///
/// The declaration transaction uses this to make its on-ledger acceptance
/// conditional on possession of a valid close-transaction signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSigner {
    /// Signer the payload signature must verify under
    pub signer: VerifyingKey,
    /// Payload the signature must cover
    pub payload: TransactionHash,
}

/// A single ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Updates an account's master weight, thresholds and/or one signer
    SetOptions {
        /// Account being reconfigured
        account: AccountId,
        /// New master key weight, if changing
        master_weight: Option<u32>,
        /// New low threshold, if changing
        low_threshold: Option<u32>,
        /// New medium threshold, if changing
        medium_threshold: Option<u32>,
        /// New high threshold, if changing
        high_threshold: Option<u32>,
        /// Signer update, if any
        signer: Option<SignerUpdate>,
    },
    /// Moves an amount of an asset between two accounts
    Payment {
        /// Paying account
        from: AccountId,
        /// Receiving account
        to: AccountId,
        /// Asset being moved
        asset: Asset,
        /// Amount being moved
        amount: i64,
    },
    /// Establishes a trustline from an account to a credit asset
    ChangeTrust {
        /// Account extending trust
        account: AccountId,
        /// Asset being trusted
        asset: Asset,
    },
    /// Raises an account's sequence number to a target value
    BumpSequence {
        /// Account whose sequence is bumped
        account: AccountId,
        /// Target sequence
        to: i64,
    },
}

impl Operation {
    fn write_canonical(&self, out: &mut Vec<u8>) {
        fn write_opt_u32(out: &mut Vec<u8>, v: &Option<u32>) {
            match v {
                None => out.push(0),
                Some(v) => {
                    out.push(1);
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
        }

        match self {
            Operation::SetOptions {
                account,
                master_weight,
                low_threshold,
                medium_threshold,
                high_threshold,
                signer,
            } => {
                out.push(0);
                out.extend_from_slice(account.as_bytes());
                write_opt_u32(out, master_weight);
                write_opt_u32(out, low_threshold);
                write_opt_u32(out, medium_threshold);
                write_opt_u32(out, high_threshold);
                match signer {
                    None => out.push(0),
                    Some(s) => {
                        out.push(1);
                        out.extend_from_slice(&s.key.to_bytes());
                        out.extend_from_slice(&s.weight.to_be_bytes());
                    }
                }
            }
            Operation::Payment { from, to, asset, amount } => {
                out.push(1);
                out.extend_from_slice(from.as_bytes());
                out.extend_from_slice(to.as_bytes());
                asset.write_canonical(out);
                out.extend_from_slice(&amount.to_be_bytes());
            }
            Operation::ChangeTrust { account, asset } => {
                out.push(2);
                out.extend_from_slice(account.as_bytes());
                asset.write_canonical(out);
            }
            Operation::BumpSequence { account, to } => {
                out.push(3);
                out.extend_from_slice(account.as_bytes());
                out.extend_from_slice(&to.to_be_bytes());
            }
        }
    }
}

/// A detached signature attached to a transaction, tagged with a 4-byte
/// hint identifying the signer key or payload it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoratedSignature {
    /// Hint identifying the signer or payload
    pub hint: [u8; 4],
    /// The detached 64-byte signature
    pub signature: Signature,
}

impl DecoratedSignature {
    /// Decorates a signature with the hint of the signer key it verifies
    /// under.
    pub fn new(signature: Signature, signer: &VerifyingKey) -> Self {
        DecoratedSignature { hint: signer_hint(signer), signature }
    }

    /// Decorates a signature with the hint of the payload it covers,
    /// for extra payload signers.
    pub fn for_payload(signature: Signature, payload: &TransactionHash) -> Self {
        let bytes = payload.as_bytes();
        DecoratedSignature { hint: [bytes[28], bytes[29], bytes[30], bytes[31]], signature }
    }
}

/// A ledger transaction in canonical, deterministic form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Account whose sequence slot the transaction consumes
    pub source_account: AccountId,
    /// Sequence the transaction is valid at
    pub sequence: i64,
    /// Minimum age in seconds of the source account's current sequence
    /// before the transaction is acceptable
    pub min_sequence_age: u64,
    /// Minimum number of ledgers closed since the source account's current
    /// sequence before the transaction is acceptable
    pub min_sequence_ledger_gap: i64,
    /// Latest acceptance time as unix seconds, if bounded
    pub valid_before: Option<u64>,
    /// Extra required payload signer, if any
    pub extra_signer: Option<PayloadSigner>,
    /// Operations applied atomically when the transaction executes
    pub operations: Vec<Operation>,
    /// Attached signatures; excluded from the hash
    pub signatures: Vec<DecoratedSignature>,
}

impl Transaction {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.source_account.as_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.min_sequence_age.to_be_bytes());
        out.extend_from_slice(&self.min_sequence_ledger_gap.to_be_bytes());
        match self.valid_before {
            None => out.push(0),
            Some(t) => {
                out.push(1);
                out.extend_from_slice(&t.to_be_bytes());
            }
        }
        match &self.extra_signer {
            None => out.push(0),
            Some(s) => {
                out.push(1);
                out.extend_from_slice(&s.signer.to_bytes());
                out.extend_from_slice(s.payload.as_bytes());
            }
        }
        out.extend_from_slice(&(self.operations.len() as u32).to_be_bytes());
        for op in &self.operations {
            op.write_canonical(&mut out);
        }
        out
    }

    /// Computes the deterministic 32-byte transaction hash under a network
    /// passphrase.
    pub fn hash(&self, network_passphrase: &str) -> TransactionHash {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(TX_DOMAIN_TAG);
        hasher.update(self.canonical_bytes());
        TransactionHash(hasher.finalize().into())
    }

    /// Signs the transaction hash with a keypair, yielding a detached
    /// signature.
    pub fn sign(&self, network_passphrase: &str, key: &SigningKey) -> Signature {
        key.sign(self.hash(network_passphrase).as_bytes())
    }

    /// Returns true if the signature verifies under the signer against this
    /// transaction's hash.
    pub fn verified_by(
        &self,
        network_passphrase: &str,
        signer: &VerifyingKey,
        signature: &Signature,
    ) -> bool {
        signer.verify_strict(self.hash(network_passphrase).as_bytes(), signature).is_ok()
    }

    /// Attaches a decorated signature.
    pub fn attach_signature(&mut self, signature: DecoratedSignature) {
        self.signatures.push(signature);
    }

    /// Returns the attached signatures.
    pub fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tx() -> Transaction {
        Transaction {
            source_account: AccountId::from_bytes([1u8; 32]),
            sequence: 102,
            min_sequence_age: 300,
            min_sequence_ledger_gap: 5,
            valid_before: None,
            extra_signer: None,
            operations: vec![Operation::Payment {
                from: AccountId::from_bytes([1u8; 32]),
                to: AccountId::from_bytes([2u8; 32]),
                asset: Asset::Native,
                amount: 100,
            }],
            signatures: vec![],
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_passphrase_scoped() {
        let tx = test_tx();
        assert_eq!(tx.hash("Test Network"), tx.hash("Test Network"));
        assert_ne!(tx.hash("Test Network"), tx.hash("Other Network"));
    }

    #[test]
    fn test_hash_ignores_attached_signatures() {
        let mut tx = test_tx();
        let before = tx.hash("Test Network");
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let sig = tx.sign("Test Network", &key);
        tx.attach_signature(DecoratedSignature::new(sig, &key.verifying_key()));
        assert_eq!(tx.hash("Test Network"), before);
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = test_tx();
        let mut sequence = base.clone();
        sequence.sequence += 1;
        let mut age = base.clone();
        age.min_sequence_age += 1;
        let mut gap = base.clone();
        gap.min_sequence_ledger_gap += 1;
        let mut bound = base.clone();
        bound.valid_before = Some(1);
        let mut extra = base.clone();
        extra.extra_signer = Some(PayloadSigner {
            signer: SigningKey::from_bytes(&[7u8; 32]).verifying_key(),
            payload: TransactionHash([0u8; 32]),
        });

        let hash = base.hash("t");
        for changed in [sequence, age, gap, bound, extra] {
            assert_ne!(changed.hash("t"), hash);
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let tx = test_tx();
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let other = SigningKey::from_bytes(&[8u8; 32]);

        let sig = tx.sign("Test Network", &key);
        assert!(tx.verified_by("Test Network", &key.verifying_key(), &sig));
        assert!(!tx.verified_by("Test Network", &other.verifying_key(), &sig));
        assert!(!tx.verified_by("Other Network", &key.verifying_key(), &sig));
    }
}
