// In: src/orchestrator/mod.rs

//! This module contains the profile-driven orchestrator for a reconciliation run.
//!
//! ARCHITECTURAL OVERVIEW
//!
//! A run is three strictly ordered phases over one explicit collection value:
//!
//! 1.  **INGEST:** list the bucket (sorted by key), and for every key with the
//!     configured suffix: extract year → fetch → decode → resolve collection →
//!     reconcile sublayer. Each file yields its own `Result`; failures are
//!     logged and the loop moves on.
//! 2.  **COLLECTION-READY:** resolve the collection once more (served from the
//!     registry's name → handle map when ingestion already did) and read its
//!     sublayers in persisted order. Failure here ends the run after phase 1.
//! 3.  **VIEW-AND-ARTIFACT:** for each consumer profile, in configured order,
//!     select sublayers by name/year, reconcile the view, and only then build
//!     the map and dashboard.
//!
//! Nothing is held between runs; idempotence comes from the reconcilers
//! reading platform state before they write.

pub mod cancel;
pub mod core;
pub mod report;

pub use self::cancel::CancellationToken;
pub use self::core::Orchestrator;
pub use self::report::{FileReport, ProfileArtifacts, ProfileReport, RunReport, RunSummary};
