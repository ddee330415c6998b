//! # veritrace-zkp — Zero-Knowledge Attestation Oracle
//!
//! The opaque proof capability consumed by authenticity aggregation. The
//! stack only ever uses the boolean validity result; proof internals stay
//! behind the [`AttestationOracle`] trait so a real proving system can
//! replace the mock without touching callers.

pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

pub use traits::{AttestationOracle, Proof, ProofError, PublicSignals, VerifyError};

#[cfg(feature = "mock")]
pub use mock::MockAttestationOracle;
