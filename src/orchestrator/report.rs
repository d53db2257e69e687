// In: src/orchestrator/report.rs

//! The run report: every unit of work and how it ended.
//!
//! Each file and each profile carries its own `Result`, so one failure never
//! hides the outcome of its siblings.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{FloodSyncError, SyncResult};
use crate::reconcile::{SublayerAction, SublayerOutcome, ViewOutcome};
use crate::types::{CollectionHandle, DashboardHandle, MapHandle, SublayerInfo};

/// Outcome of ingesting one storage object.
#[derive(Debug)]
pub struct FileReport {
    pub key: String,
    pub result: SyncResult<SublayerOutcome>,
}

impl FileReport {
    /// A file whose name carried no year was skipped, not failed.
    pub fn is_skipped(&self) -> bool {
        matches!(self.result, Err(FloodSyncError::MissingYear(_)))
    }
}

/// Everything built for one consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileArtifacts {
    pub view: ViewOutcome,
    pub map: MapHandle,
    pub dashboard: DashboardHandle,
}

/// Outcome of one consumer profile.
#[derive(Debug)]
pub struct ProfileReport {
    pub profile: String,
    /// Sublayer names the profile's subset rule selected, in persisted order.
    pub selected_sublayers: Vec<String>,
    pub result: SyncResult<ProfileArtifacts>,
}

#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// The collection as resolved in the collection-ready phase.
    pub collection: Option<CollectionHandle>,
    /// The collection's sublayers in persisted order, as seen after ingestion.
    pub sublayers: Vec<SublayerInfo>,
    pub files: Vec<FileReport>,
    /// Keys that did not carry the configured suffix.
    pub ignored_keys: Vec<String>,
    pub listing_error: Option<FloodSyncError>,
    /// Set when the collection could not be resolved after ingestion; no
    /// profile is processed in that case.
    pub collection_error: Option<FloodSyncError>,
    pub profiles: Vec<ProfileReport>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            collection: None,
            sublayers: Vec::new(),
            files: Vec::new(),
            ignored_keys: Vec::new(),
            listing_error: None,
            collection_error: None,
            profiles: Vec::new(),
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// `true` when every unit of work that was attempted succeeded.
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self.listing_error.is_none()
            && self.collection_error.is_none()
            && self.files.iter().all(|f| f.result.is_ok() || f.is_skipped())
            && self.profiles.iter().all(|p| p.result.is_ok())
    }

    pub fn file(&self, key: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.key == key)
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileReport> {
        self.profiles.iter().find(|p| p.profile == name)
    }

    /// Profile name and dashboard URL for every profile that got one.
    pub fn dashboard_urls(&self) -> Vec<(&str, &str)> {
        self.profiles
            .iter()
            .filter_map(|p| match &p.result {
                Ok(artifacts) => Some((p.profile.as_str(), artifacts.dashboard.url.as_str())),
                Err(_) => None,
            })
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            cancelled: self.cancelled,
            ..RunSummary::default()
        };
        for file in &self.files {
            match &file.result {
                Ok(outcome) => match outcome.action {
                    SublayerAction::Created => summary.sublayers_created += 1,
                    SublayerAction::Replaced | SublayerAction::Appended => {
                        summary.sublayers_updated += 1
                    }
                },
                Err(_) if file.is_skipped() => summary.files_skipped += 1,
                Err(_) => summary.files_failed += 1,
            }
        }
        for profile in &self.profiles {
            if profile.result.is_ok() {
                summary.profiles_published += 1;
            } else {
                summary.profiles_failed += 1;
            }
        }
        summary.elapsed_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0));
        summary
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts for a one-line log summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sublayers_created: usize,
    pub sublayers_updated: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub profiles_published: usize,
    pub profiles_failed: usize,
    pub cancelled: bool,
    pub elapsed_ms: Option<i64>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            concat!(
                "sublayers: {} created, {} updated | files: {} skipped, {} failed",
                " | profiles: {} published, {} failed"
            ),
            self.sublayers_created,
            self.sublayers_updated,
            self.files_skipped,
            self.files_failed,
            self.profiles_published,
            self.profiles_failed
        )?;
        if let Some(ms) = self.elapsed_ms {
            write!(f, " | {} ms", ms)?;
        }
        if self.cancelled {
            write!(f, " | CANCELLED")?;
        }
        Ok(())
    }
}
