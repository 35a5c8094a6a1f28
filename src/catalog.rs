//! Media catalog contract and a filesystem-backed implementation

use crate::domain::{MediaEntry, MediaId};
use crate::error::CatalogError;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Identifies a deletion batch that is waiting on an external confirmation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfirmationToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The entries the catalog actually removed; may be a subset of the batch
    Deleted(Vec<MediaId>),
    /// The user must approve the batch before anything is removed
    NeedsConfirmation(ConfirmationToken),
}

/// Source of media entries and the place deletions are carried out.
///
/// Both calls may take a long time; they are the only points where a
/// session waits.
pub trait MediaCatalog: Send + Sync + 'static {
    fn scan(&self) -> impl Future<Output = Result<Vec<MediaEntry>, CatalogError>> + Send;

    fn delete(
        &self,
        entries: &[MediaEntry],
    ) -> impl Future<Output = Result<DeleteOutcome, CatalogError>> + Send;
}

/// Walks a directory tree for images and videos and deletes them to the system trash
#[derive(Debug)]
pub struct FilesystemCatalog {
    root: PathBuf,
    show_hidden: bool,
    /// Report deletions without touching files
    dry_run: bool,
    require_confirmation: bool,
    pending: Mutex<HashMap<ConfirmationToken, Vec<(MediaId, PathBuf)>>>,
    next_token: AtomicU64,
}

impl FilesystemCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            show_hidden: false,
            dry_run: false,
            require_confirmation: false,
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.show_hidden = show_hidden;
    }

    /// When set, `delete` hands back a token and waits for `complete_confirmation`
    pub fn set_require_confirmation(&mut self, require: bool) {
        self.require_confirmation = require;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files in a batch awaiting confirmation
    pub fn pending_len(&self, token: ConfirmationToken) -> Option<usize> {
        self.pending
            .lock()
            .ok()
            .and_then(|pending| pending.get(&token).map(Vec::len))
    }

    /// Carries out a batch the user approved, returning the entries that were removed
    pub async fn complete_confirmation(
        &self,
        token: ConfirmationToken,
    ) -> Result<Vec<MediaId>, CatalogError> {
        let paths = self.take_pending(token)?;
        let dry_run = self.dry_run;
        tokio::task::spawn_blocking(move || trash_paths(&paths, dry_run))
            .await
            .map_err(|e| CatalogError::QueryError(format!("Delete task failed: {}", e)))
    }

    /// Drops a batch the user declined
    pub fn cancel_confirmation(&self, token: ConfirmationToken) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&token);
        }
    }

    fn take_pending(
        &self,
        token: ConfirmationToken,
    ) -> Result<Vec<(MediaId, PathBuf)>, CatalogError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| CatalogError::QueryError("Pending batch lock poisoned".to_string()))?;
        pending.remove(&token).ok_or_else(|| {
            CatalogError::QueryError(format!("Unknown confirmation token {}", token.0))
        })
    }
}

impl MediaCatalog for FilesystemCatalog {
    async fn scan(&self) -> Result<Vec<MediaEntry>, CatalogError> {
        let root = self.root.clone();
        let show_hidden = self.show_hidden;
        tokio::task::spawn_blocking(move || scan_directory(&root, show_hidden))
            .await
            .map_err(|e| CatalogError::QueryError(format!("Scan task failed: {}", e)))?
    }

    async fn delete(&self, entries: &[MediaEntry]) -> Result<DeleteOutcome, CatalogError> {
        let paths: Vec<(MediaId, PathBuf)> = entries
            .iter()
            .map(|e| (e.id, e.location.clone()))
            .collect();

        if self.require_confirmation {
            let token = ConfirmationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| CatalogError::QueryError("Pending batch lock poisoned".to_string()))?;
            pending.insert(token, paths);
            return Ok(DeleteOutcome::NeedsConfirmation(token));
        }

        let dry_run = self.dry_run;
        let deleted = tokio::task::spawn_blocking(move || trash_paths(&paths, dry_run))
            .await
            .map_err(|e| CatalogError::QueryError(format!("Delete task failed: {}", e)))?;
        Ok(DeleteOutcome::Deleted(deleted))
    }
}

/// Collects media under `root`, newest first.
///
/// Unreadable entries below the root are skipped; only a failure on the root
/// itself is reported.
fn scan_directory(root: &Path, show_hidden: bool) -> Result<Vec<MediaEntry>, CatalogError> {
    let metadata = std::fs::metadata(root).map_err(|e| map_root_error(root, e))?;
    if !metadata.is_dir() {
        return Err(CatalogError::IndexUnavailable(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    let mut next_id = 1u64;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || show_hidden || !is_hidden(e.file_name()));

    for dir_entry in walker {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(e) => {
                if e.depth() == 0 {
                    let io_err = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("walk error"));
                    return Err(map_root_error(root, io_err));
                }
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !dir_entry.file_type().is_file() {
            continue;
        }

        match MediaEntry::from_path(root, dir_entry.path(), MediaId(next_id)) {
            Ok(Some(entry)) => {
                entries.push(entry);
                next_id += 1;
            }
            Ok(None) => {}
            Err(e) => debug!("Skipping {}: {}", dir_entry.path().display(), e),
        }
    }

    entries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    Ok(entries)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

fn map_root_error(root: &Path, err: io::Error) -> CatalogError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CatalogError::PermissionDenied,
        io::ErrorKind::NotFound => {
            CatalogError::IndexUnavailable(format!("Directory not found: {}", root.display()))
        }
        _ => CatalogError::QueryError(err.to_string()),
    }
}

/// Moves each path to the system trash, returning the ids that made it
fn trash_paths(paths: &[(MediaId, PathBuf)], dry_run: bool) -> Vec<MediaId> {
    if dry_run {
        return paths
            .iter()
            .filter(|(_, path)| path.exists())
            .map(|(id, _)| *id)
            .collect();
    }

    let mut deleted = Vec::with_capacity(paths.len());
    for (id, path) in paths {
        match trash::delete(path) {
            Ok(()) => deleted.push(*id),
            Err(e) => warn!("Failed to trash {}: {}", path.display(), e),
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaKind;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_scan_finds_media_recursively() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "DCIM/Camera/a.jpg", b"aaaa");
        write(temp_dir.path(), "DCIM/Screenshots/b.png", b"bb");
        write(temp_dir.path(), "Movies/c.mp4", b"cccccc");
        write(temp_dir.path(), "notes.txt", b"text");

        let catalog = FilesystemCatalog::new(temp_dir.path());
        let entries = catalog.scan().await.unwrap();

        assert_eq!(entries.len(), 3);
        let names: Vec<_> = entries.iter().map(|e| e.display_name.as_str()).collect();
        assert!(names.contains(&"a.jpg"));
        assert!(names.contains(&"b.png"));
        assert!(names.contains(&"c.mp4"));

        let video = entries.iter().find(|e| e.display_name == "c.mp4").unwrap();
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(video.bucket.as_deref(), Some("Movies"));
    }

    #[tokio::test]
    async fn test_scan_assigns_unique_ids() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.jpg", b"a");
        write(temp_dir.path(), "b.jpg", b"b");
        write(temp_dir.path(), "sub/c.jpg", b"c");

        let entries = FilesystemCatalog::new(temp_dir.path()).scan().await.unwrap();

        let mut ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_skips_hidden() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "visible.jpg", b"v");
        write(temp_dir.path(), ".hidden.jpg", b"h");
        write(temp_dir.path(), ".thumbnails/t.jpg", b"t");

        let mut catalog = FilesystemCatalog::new(temp_dir.path());
        assert_eq!(catalog.scan().await.unwrap().len(), 1);

        catalog.set_show_hidden(true);
        assert_eq!(catalog.scan().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_scan_missing_root() {
        let catalog = FilesystemCatalog::new("/nonexistent/swipe-cleaner/library");
        let result = catalog.scan().await;
        assert!(matches!(result, Err(CatalogError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_dry_run_delete_keeps_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "a.jpg", b"a");

        let mut catalog = FilesystemCatalog::new(temp_dir.path());
        catalog.set_dry_run(true);
        let entries = catalog.scan().await.unwrap();

        let outcome = catalog.delete(&entries).await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted(vec![entries[0].id]));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_delete_reports_only_removed_entries() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.jpg", b"aaaa");
        let gone = write(temp_dir.path(), "b.jpg", b"b");

        let mut catalog = FilesystemCatalog::new(temp_dir.path());
        catalog.set_dry_run(true);
        let entries = catalog.scan().await.unwrap();
        fs::remove_file(&gone).unwrap();

        let outcome = catalog.delete(&entries).await.unwrap();

        let kept = entries.iter().find(|e| e.display_name == "a.jpg").unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted(vec![kept.id]));
    }

    #[tokio::test]
    async fn test_confirmation_flow_returns_token() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "a.jpg", b"a");

        let mut catalog = FilesystemCatalog::new(temp_dir.path());
        catalog.set_dry_run(true);
        catalog.set_require_confirmation(true);
        let catalog = Arc::new(catalog);
        let entries = catalog.scan().await.unwrap();

        let token = match catalog.delete(&entries).await.unwrap() {
            DeleteOutcome::NeedsConfirmation(token) => token,
            other => panic!("expected confirmation, got {:?}", other),
        };
        assert_eq!(catalog.pending_len(token), Some(1));

        let deleted = catalog.complete_confirmation(token).await.unwrap();
        assert_eq!(deleted, vec![entries[0].id]);
        assert!(path.exists());
        assert_eq!(catalog.pending_len(token), None);
    }

    #[tokio::test]
    async fn test_cancel_confirmation_forgets_batch() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.jpg", b"a");

        let mut catalog = FilesystemCatalog::new(temp_dir.path());
        catalog.set_require_confirmation(true);
        let catalog = Arc::new(catalog);
        let entries = catalog.scan().await.unwrap();

        let DeleteOutcome::NeedsConfirmation(token) = catalog.delete(&entries).await.unwrap() else {
            panic!("expected confirmation");
        };
        catalog.cancel_confirmation(token);

        assert!(catalog.complete_confirmation(token).await.is_err());
    }
}
