//! Error types for the swipe cleaner

use std::fmt;
use thiserror::Error;

/// Why a catalog scan failed, as surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFailure {
    /// Read access to the media library was refused
    Permission,
    /// The index was unavailable or the query failed
    Generic,
}

impl ScanFailure {
    /// User-facing message for the failure, with a retry hint
    pub fn message(&self) -> &'static str {
        match self {
            ScanFailure::Permission => {
                "Scan failed: permission to read media was denied. Grant access and rescan."
            }
            ScanFailure::Generic => "Scan failed: the media library is unavailable. Try rescanning.",
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFailure::Permission => write!(f, "permission"),
            ScanFailure::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SwipeCleanerError {
    #[error("No item to act on: the queue is empty")]
    EmptyQueue,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Scan failed ({0})")]
    ScanFailed(ScanFailure),

    #[error("Deletion was canceled")]
    DeletionCanceled,

    #[error("Deletion failed: {0}")]
    DeletionFailed(String),

    #[error("A deletion batch is awaiting confirmation")]
    DeletionInProgress,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failures reported by a media catalog
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Media index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

impl CatalogError {
    /// Collapses a catalog error into the user-facing scan failure kind
    pub fn scan_failure(&self) -> ScanFailure {
        match self {
            CatalogError::PermissionDenied => ScanFailure::Permission,
            CatalogError::IndexUnavailable(_) | CatalogError::QueryError(_) => ScanFailure::Generic,
        }
    }
}

impl From<CatalogError> for SwipeCleanerError {
    fn from(err: CatalogError) -> Self {
        SwipeCleanerError::ScanFailed(err.scan_failure())
    }
}

pub type Result<T> = std::result::Result<T, SwipeCleanerError>;
