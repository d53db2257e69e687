//! Ingestion leaves: turning a storage object into something the reconcilers
//! can merge.
//!
//! Both functions here are pure. Fetching bytes is the storage collaborator's
//! job (`platform::ObjectStore`); merging is the sublayer reconciler's.

pub mod decoder;
pub mod year;

pub use decoder::decode_features;
pub use year::{base_name, extract_year};
