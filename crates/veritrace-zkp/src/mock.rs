//! # Mock Attestation Oracle
//!
//! A deterministic, transparent stand-in for a real proving system.
//! The commitment is `SHA-256(secret)`; the proof is
//! `SHA-256(subject_id || commitment || timestamp)`. A verifier can
//! recompute the proof from the public signals alone, and the secret
//! never appears in them.
//!
//! ## Security Notice
//!
//! This implementation provides NO zero-knowledge privacy beyond hiding
//! the raw secret behind a hash. It exists so the authenticity
//! aggregation path is fully exercisable; production deployments must
//! substitute a real proof system behind [`AttestationOracle`].

use sha2::{Digest, Sha256};

use crate::traits::{AttestationOracle, Proof, ProofError, PublicSignals, VerifyError};

/// Deterministic mock proof system.
#[derive(Debug, Default)]
pub struct MockAttestationOracle;

impl MockAttestationOracle {
    /// Create the mock oracle.
    pub fn new() -> Self {
        Self
    }

    fn proof_bytes(subject_id: &str, commitment: &[u8], timestamp: i64) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(subject_id.as_bytes());
        hasher.update(commitment);
        hasher.update(timestamp.to_be_bytes());
        hasher.finalize().to_vec()
    }
}

impl AttestationOracle for MockAttestationOracle {
    fn generate_proof(
        &self,
        subject_id: &str,
        secret: &[u8],
        timestamp: i64,
    ) -> Result<(Proof, PublicSignals), ProofError> {
        if subject_id.is_empty() {
            return Err(ProofError::WitnessError(
                "subject id must not be empty".to_string(),
            ));
        }
        if secret.is_empty() {
            return Err(ProofError::WitnessError(
                "secret must not be empty".to_string(),
            ));
        }

        let commitment = Sha256::digest(secret).to_vec();
        let proof = Proof {
            bytes: Self::proof_bytes(subject_id, &commitment, timestamp),
        };
        let signals = PublicSignals {
            subject_id: subject_id.to_string(),
            timestamp,
            commitment,
        };
        Ok((proof, signals))
    }

    fn verify_proof(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool, VerifyError> {
        if proof.bytes.len() != 32 {
            return Err(VerifyError::MalformedProof(format!(
                "expected 32 proof bytes, got {}",
                proof.bytes.len()
            )));
        }
        if signals.commitment.len() != 32 {
            return Err(VerifyError::MalformedSignals(format!(
                "expected 32 commitment bytes, got {}",
                signals.commitment.len()
            )));
        }

        let expected =
            Self::proof_bytes(&signals.subject_id, &signals.commitment, signals.timestamp);
        Ok(expected == proof.bytes)
    }
}
