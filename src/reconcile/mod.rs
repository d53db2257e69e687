// In: src/reconcile/mod.rs

//! Idempotent reconcilers for the platform-side resources.
//!
//! Each reconciler reads the current platform state before it writes, so
//! running it twice with the same input yields the same end state:
//!
//! - `registry`: find-or-create the one logical collection.
//! - `sublayer`: one `flood_data_<year>` sublayer per year.
//! - `view`: one filtered view per consumer name.
//! - `retry`: the bounded retry/timeout policy every external call goes through.

pub mod registry;
pub mod retry;
pub mod sublayer;
pub mod view;

pub use registry::CollectionRegistry;
pub use retry::CallPolicy;
pub use sublayer::{SublayerAction, SublayerOutcome, SublayerReconciler};
pub use view::{ViewAction, ViewOutcome, ViewReconciler, ViewRequest};
