// In: src/error.rs

//! This module defines the single, unified error type for the flood-sync engine.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Collaborators (storage, platform, visualizer) report failures as a
//! [`PlatformError`]. The reconcilers translate those into the semantic
//! variants of [`FloodSyncError`] so that the run report always says *which*
//! stage failed, not just which remote call did.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type SyncResult<T> = Result<T, FloodSyncError>;

#[derive(Error, Debug)]
pub enum FloodSyncError {
    // =========================================================================
    // === Per-unit Errors (one file or one profile fails, the run goes on)
    // =========================================================================
    #[error("Malformed geometry payload: {0}")]
    Decode(String),

    #[error("No four-digit year found in file name '{0}'")]
    MissingYear(String),

    #[error("Sublayer '{sublayer}' definition rejected: {reason}")]
    SchemaUpdate { sublayer: String, reason: String },

    #[error("View '{view}' unavailable: {reason}")]
    View { view: String, reason: String },

    #[error("Visualization '{title}' could not be built: {reason}")]
    Artifact { title: String, reason: String },

    #[error("Object storage failure for '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: PlatformError,
    },

    // =========================================================================
    // === Run-level Errors
    // =========================================================================
    /// Resolving or creating the shared collection failed. Fatal for views.
    #[error("Collection '{name}' could not be resolved: {source}")]
    Registry {
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error("Run cancelled before '{0}'")]
    Cancelled(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem (config files, log files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl FloodSyncError {
    /// A short, stable label for the error class. Used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            FloodSyncError::Decode(_) => "DecodeError",
            FloodSyncError::MissingYear(_) => "MissingYear",
            FloodSyncError::SchemaUpdate { .. } => "SchemaUpdateError",
            FloodSyncError::View { .. } => "ViewError",
            FloodSyncError::Artifact { .. } => "ArtifactError",
            FloodSyncError::Storage { .. } => "StorageError",
            FloodSyncError::Registry { .. } => "RegistryError",
            FloodSyncError::Cancelled(_) => "Cancelled",
            FloodSyncError::Config(_) => "ConfigError",
            FloodSyncError::Io(_) => "IoError",
            FloodSyncError::SerdeJson(_) => "SerdeJsonError",
        }
    }

    /// `true` when the underlying collaborator failure was transient. Decode,
    /// schema and configuration errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            FloodSyncError::Storage { source, .. } | FloodSyncError::Registry { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }
}

//==================================================================================
// Collaborator Errors
//==================================================================================

/// How a collaborator call failed. Drives the retry decision in `CallPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// The service hiccupped (throttling, 5xx, dropped connection). Worth retrying.
    Transient,
    /// The call did not finish inside its deadline.
    Timeout,
    /// The service understood the request and refused it.
    Rejected,
    /// The addressed resource does not exist.
    NotFound,
}

/// An error reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Transient, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Rejected, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PlatformErrorKind::Timeout, message)
    }

    /// Only transient failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            PlatformErrorKind::Transient | PlatformErrorKind::Timeout
        )
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PlatformError {}
