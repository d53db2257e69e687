// In: src/config.rs

//! The single source of truth for all flood-sync run configuration.
//!
//! This module defines the unified `SyncConfig` struct, which is designed to be
//! created once at the application boundary (e.g., from a JSON file) and then
//! passed down through the orchestrator by reference. It carries the collection
//! naming rules, the platform defaults for new collections, the external call
//! policy and the ordered list of consumer profiles.

use std::path::Path;
use std::time::Duration;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::error::{FloodSyncError, SyncResult};
use crate::types::{Capability, FeatureWriteMode};

//==================================================================================
// I. Consumer Profiles
//==================================================================================

/// Which sublayers a consumer's view is scoped to.
///
/// Selection is always by sublayer name (and the year embedded in it), never
/// by position in the collection's layer list.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SubsetRule {
    /// **Default:** every sublayer of the collection.
    #[default]
    All,
    /// Only sublayers whose year is in the set.
    Years { years: Vec<u16> },
}

impl SubsetRule {
    /// Returns `true` if a sublayer keyed by `year` belongs to this subset.
    /// Sublayers without a recognisable year only match `All`.
    pub fn matches(&self, year: Option<u16>) -> bool {
        match self {
            SubsetRule::All => true,
            SubsetRule::Years { years } => year.map_or(false, |y| years.contains(&y)),
        }
    }
}

/// A downstream consumer: who they are, what view they get and how it is titled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConsumerProfile {
    pub name: String,
    pub contact_email: String,
    pub view_name: String,
    /// Boolean attribute expression, passed through to the platform untouched.
    pub predicate: String,
    pub display_title: String,
    #[serde(default)]
    pub subset: SubsetRule,
}

//==================================================================================
// II. Platform Defaults & External Call Policy
//==================================================================================

/// Parameters used when the collection has to be created from scratch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefaults {
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_snippet")]
    pub snippet: String,
    #[serde(default = "Capability::full_crud")]
    pub capabilities: Vec<Capability>,
    /// Upper bound on search hits inspected when looking for an existing collection.
    #[serde(default = "default_max_search_items")]
    pub max_search_items: usize,
}

impl Default for ServiceDefaults {
    fn default() -> Self {
        Self {
            tags: default_tags(),
            snippet: default_snippet(),
            capabilities: Capability::full_crud(),
            max_search_items: default_max_search_items(),
        }
    }
}

/// Bounded retry and deadline settings for calls into external services.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicyConfig {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Wall-clock budget for one logical call, retries included.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl CallPolicyConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for CallPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

//==================================================================================
// III. The Unified SyncConfig
//==================================================================================

/// The single, unified configuration for one reconciliation run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Title of the one logical collection every file is merged into.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Storage bucket listed for input files.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Exact, case-sensitive key suffix of files to ingest.
    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    /// Sublayer names are `<prefix><year>`.
    #[serde(default = "default_sublayer_prefix")]
    pub sublayer_prefix: String,

    /// How a year that already has a sublayer is re-ingested.
    #[serde(default)]
    pub reingest_mode: FeatureWriteMode,

    #[serde(default)]
    pub service: ServiceDefaults,

    #[serde(default)]
    pub call_policy: CallPolicyConfig,

    /// Consumer profiles, processed in this order.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ConsumerProfile>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection_name: default_collection_name(),
            bucket: default_bucket(),
            file_suffix: default_file_suffix(),
            sublayer_prefix: default_sublayer_prefix(),
            reingest_mode: FeatureWriteMode::default(),
            service: ServiceDefaults::default(),
            call_policy: CallPolicyConfig::default(),
            profiles: default_profiles(),
        }
    }
}

impl SyncConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Rejects configurations the run could not honour.
    pub fn validate(&self) -> SyncResult<()> {
        if self.collection_name.trim().is_empty() {
            return Err(FloodSyncError::Config(
                "collection_name must not be empty".to_string(),
            ));
        }
        if self.file_suffix.is_empty() {
            return Err(FloodSyncError::Config(
                "file_suffix must not be empty".to_string(),
            ));
        }
        if self.call_policy.max_attempts == 0 {
            return Err(FloodSyncError::Config(
                "call_policy.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut profile_names = HashSet::new();
        let mut view_names = HashSet::new();
        for profile in &self.profiles {
            if !profile_names.insert(profile.name.as_str()) {
                return Err(FloodSyncError::Config(format!(
                    "duplicate profile name '{}'",
                    profile.name
                )));
            }
            if !view_names.insert(profile.view_name.as_str()) {
                return Err(FloodSyncError::Config(format!(
                    "view name '{}' is used by more than one profile",
                    profile.view_name
                )));
            }
            if profile.predicate.trim().is_empty() {
                return Err(FloodSyncError::Config(format!(
                    "profile '{}' has an empty predicate",
                    profile.name
                )));
            }
        }
        Ok(())
    }

    /// The sublayer name for a year key, e.g. `flood_data_2022`.
    pub fn sublayer_name(&self, year_key: &str) -> String {
        format!("{}{}", self.sublayer_prefix, year_key)
    }

    /// Inverse of [`sublayer_name`](Self::sublayer_name): the year of a sublayer
    /// this run would have named, if any.
    pub fn sublayer_year(&self, sublayer_name: &str) -> Option<u16> {
        let key = sublayer_name.strip_prefix(&self.sublayer_prefix)?;
        if key.len() == 4 && key.bytes().all(|b| b.is_ascii_digit()) {
            key.parse().ok()
        } else {
            None
        }
    }
}

//==================================================================================
// IV. Serde Defaults
//==================================================================================

fn default_collection_name() -> String {
    "Flood_Data".to_string()
}

fn default_bucket() -> String {
    "flood-data-bucket".to_string()
}

fn default_file_suffix() -> String {
    ".geojson".to_string()
}

fn default_sublayer_prefix() -> String {
    "flood_data_".to_string()
}

fn default_tags() -> Vec<String> {
    vec!["Flood".into(), "Feature".into(), "Service".into()]
}

fn default_snippet() -> String {
    "Flood data feature service".to_string()
}

fn default_max_search_items() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_call_timeout_ms() -> u64 {
    60_000
}

/// The two consumers the service was first deployed for.
fn default_profiles() -> Vec<ConsumerProfile> {
    vec![
        ConsumerProfile {
            name: "Client A".to_string(),
            contact_email: "clientA@email.com".to_string(),
            view_name: "ClientA_Flood_Data_Europe_NorthAmerica".to_string(),
            predicate: "location in ('Europe', 'North America')".to_string(),
            display_title: "Client A Flood Dashboard".to_string(),
            subset: SubsetRule::All,
        },
        ConsumerProfile {
            name: "Client B".to_string(),
            contact_email: "clientB@email.com".to_string(),
            view_name: "ClientB_Flood_Data_Global_2022_2024".to_string(),
            predicate: "year >= 2022 AND year <= 2024".to_string(),
            display_title: "Client B Flood Dashboard".to_string(),
            subset: SubsetRule::Years {
                years: vec![2022, 2023, 2024],
            },
        },
    ]
}
