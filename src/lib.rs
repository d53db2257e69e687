//! This file is the root of the `flood_sync` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`ingest`, `reconcile`,
//!     `orchestrator`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types an embedding application needs to
//!     configure and drive a reconciliation run.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod config;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod platform;
pub mod reconcile;
pub mod types;

#[cfg(test)]
mod orchestrator_tests;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use config::{ConsumerProfile, SubsetRule, SyncConfig};
pub use error::{FloodSyncError, PlatformError, PlatformErrorKind, SyncResult};
pub use observability::init_logging;
pub use orchestrator::{CancellationToken, Orchestrator, RunReport, RunSummary};
