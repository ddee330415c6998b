//! # veritrace-store — Off-Chain Provenance Store
//!
//! The single off-chain source of truth for current product state. Ledger
//! writes happen *after* the local mutation commits (see the coordinator
//! crate); the store itself never talks to a ledger.
//!
//! ## Modules
//!
//! - **Data model** (`product.rs`): `Product` and its owned sub-records
//!   (`Certification`, `EthicalScore`, `TrackingEntry`), derived-score
//!   recomputation, and the append-only tracking history.
//!
//! - **Store** (`store.rs`): in-memory keyed store with per-product
//!   optimistic concurrency. Unrelated products proceed in parallel;
//!   writes to the same product serialize on a version counter.
//!
//! ## Design
//!
//! Mutations never hold the store lock across I/O — every operation takes
//! plain data in and hands a cloned, versioned `Product` back out. A write
//! carrying a stale expected version fails with `Conflict`; it is never
//! silently applied.

pub mod error;
pub mod product;
pub mod store;

pub use error::StoreError;
pub use product::{
    Certification, CertificationStatus, EthicalScore, LedgerRefs, NewProduct, Product,
    ProductPatch, TrackingEntry, VerificationStatus,
};
pub use store::{ProductStatistics, ProvenanceStore, SearchPage};
