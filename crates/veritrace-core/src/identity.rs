//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers in the Veritrace stack.
//! These prevent accidental identifier confusion — you cannot pass a
//! `RuleId` where a `ProductId` is expected.
//!
//! Ledger keys derive from `Display` output, so the `kind:uuid` prefix
//! also namespaces records that share a key-value store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for a tracked product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

/// Unique identifier for a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationId(pub Uuid);

/// Unique identifier for a verification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

/// Manufacturer batch number. Globally unique across all products;
/// uniqueness is enforced by the provenance store at create time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchNumber(String);

/// Reference to an external user entity (owner, assessor, verifier).
///
/// User management lives outside the core; this is an opaque handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

/// Identifier of a telemetry-emitting device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl ProductId {
    /// Generate a new random product identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl VerificationId {
    /// Generate a new random verification-request identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl RuleId {
    /// Generate a new random rule identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for VerificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchNumber {
    /// Create a batch number. Rejects empty or whitespace-only input.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(CoreError::Validation(
                "batch number must not be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    /// The batch number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ActorId {
    /// Create an actor reference. Rejects empty input.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(CoreError::Validation(
                "actor id must not be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    /// The actor reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DeviceId {
    /// Create a device identifier. Rejects empty input.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(CoreError::Validation(
                "device id must not be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    /// The device identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "product:{}", self.0)
    }
}

impl std::fmt::Display for VerificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verification:{}", self.0)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

impl std::fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
