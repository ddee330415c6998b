//! # Attestation Oracle Trait
//!
//! Abstract interface for zero-knowledge proof generation and
//! verification. Implementations must be `Send + Sync`; both operations
//! are pure functions with no side effects.
//!
//! The prover holds a manufacturer secret; the verifier sees only the
//! proof and its public signals. The core consumes nothing but the
//! boolean verdict.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error during proof generation.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The witness inputs are malformed or unsatisfiable.
    #[error("witness error: {0}")]
    WitnessError(String),
    /// Internal prover error.
    #[error("prover error: {0}")]
    ProverError(String),
}

/// Error during proof verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The proof bytes are malformed (distinct from a well-formed proof
    /// that simply does not verify, which yields `Ok(false)`).
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// The public signals are inconsistent or incomplete.
    #[error("malformed public signals: {0}")]
    MalformedSignals(String),
}

/// An opaque proof blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Proof bytes, scheme-specific.
    pub bytes: Vec<u8>,
}

/// Public signals accompanying a proof. These are visible to any verifier
/// and never contain the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    /// The subject the proof speaks for (a product key).
    pub subject_id: String,
    /// Proving-time Unix timestamp (seconds).
    pub timestamp: i64,
    /// Commitment to the secret, scheme-specific.
    pub commitment: Vec<u8>,
}

/// A zero-knowledge attestation capability.
pub trait AttestationOracle: Send + Sync {
    /// Generate a proof that the holder of `secret` vouches for
    /// `subject_id` at `timestamp`.
    fn generate_proof(
        &self,
        subject_id: &str,
        secret: &[u8],
        timestamp: i64,
    ) -> Result<(Proof, PublicSignals), ProofError>;

    /// Verify a proof against its public signals.
    ///
    /// Returns `Ok(false)` for a well-formed proof that does not verify;
    /// errors are reserved for malformed inputs.
    fn verify_proof(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool, VerifyError>;
}
