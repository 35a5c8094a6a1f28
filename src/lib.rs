//! Swipe Cleaner - review a media library one item at a time
//!
//! Items are shown newest first (or by cleanup value in smart mode), swiped
//! to keep or delete, and the queued selection is deleted as one batch under
//! a free-tier quota.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod filters;
pub mod format;
pub mod input;
pub mod orchestrator;
pub mod purchase;
pub mod quota;

// Re-export primary types for convenience
pub use catalog::{ConfirmationToken, DeleteOutcome, FilesystemCatalog, MediaCatalog};
pub use config::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use domain::{ActionRecord, MediaEntry, MediaId, MediaKind, SessionQueue, SwipeAction};
pub use error::{CatalogError, Result, ScanFailure, SwipeCleanerError};
pub use filters::FilterPreset;
pub use orchestrator::{DeleteFlow, DeletionSummary, Orchestrator, ScanTrigger, SessionView};
pub use purchase::{OfflinePurchaseClient, PurchaseClient, PurchaseEvent};
pub use quota::{QuotaDecision, QuotaState, FREE_DELETE_LIMIT};
