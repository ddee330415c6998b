//! # veritrace-service — Application Service
//!
//! Wires the layers into the workflows the platform exposes: product
//! lifecycle with dual-ledger mirroring, multi-signal authenticity checks,
//! the verification request and rule workflows, telemetry ingest, search,
//! and statistics.
//!
//! The service owns no business rules of its own. It sequences the store,
//! the coordinator, the verification engine, and the attestation oracle,
//! and reports how far each change made it.

pub mod error;
pub mod service;
pub mod telemetry;

pub use error::ServiceError;
pub use service::{CommitReport, LedgerSync, ProvenanceService, VerificationStanding};
pub use telemetry::{AnalyticsSink, NoopAnalytics, TelemetryEvent};
