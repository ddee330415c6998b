//! # veritrace-core — Foundational Types for the Veritrace Stack
//!
//! This crate is the bedrock of the Veritrace provenance stack. It defines
//! the type-system primitives every other crate builds on. Every other crate
//! in the workspace depends on `veritrace-core`; it depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `ProductId`,
//!    `VerificationId`, `RuleId`, `BatchNumber`, `ActorId`, `DeviceId` — all
//!    newtypes with validated constructors. No bare strings for identifiers.
//!
//! 2. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision. Two ledgers with independent clocks is
//!    enough ambiguity; local timezone offsets are rejected at construction.
//!
//! 3. **Structured errors.** All error types derive `thiserror::Error` and
//!    carry enough context (expected vs actual version, from/to states) for
//!    a caller to act without parsing message strings.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `veritrace-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement `Serialize`/`Deserialize`.

pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::CoreError;
pub use identity::{ActorId, BatchNumber, DeviceId, ProductId, RuleId, VerificationId};
pub use temporal::Timestamp;
