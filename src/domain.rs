pub mod session_queue;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};

pub use session_queue::{SessionQueue, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a file extension, returning `None` for anything that is not media
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "heic" | "heif" | "tif" | "tiff"
            | "dng" => Some(MediaKind::Image),

            "mp4" | "mov" | "m4v" | "mkv" | "avi" | "webm" | "3gp" => Some(MediaKind::Video),

            _ => None,
        }
    }
}

/// Best-effort content type for a media extension
fn content_type_for(ext: &str) -> Option<&'static str> {
    let ext = ext.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "dng" => "image/x-adobe-dng",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4v" => "video/x-m4v",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        _ => return None,
    };
    Some(mime)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeAction {
    Keep,
    Delete,
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwipeAction::Keep => write!(f, "keep"),
            SwipeAction::Delete => write!(f, "delete"),
        }
    }
}

/// One media item known to the catalog.
///
/// Equality and hashing only look at `id`: two entries with the same
/// identifier are the same item even if their metadata was re-read.
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub id: MediaId,
    /// Opaque handle the catalog uses to locate the item
    pub location: PathBuf,
    pub display_name: String,
    pub size: u64,
    pub captured_at: DateTime<Utc>,
    pub kind: MediaKind,
    /// Storage-relative directory, e.g. `DCIM/Screenshots/`
    pub relative_path: Option<String>,
    /// Folder label the item is grouped under
    pub bucket: Option<String>,
    pub content_type: Option<String>,
}

impl MediaEntry {
    pub fn new(
        id: u64,
        display_name: impl Into<String>,
        size: u64,
        captured_at: DateTime<Utc>,
        kind: MediaKind,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id: MediaId(id),
            location: PathBuf::from(&display_name),
            display_name,
            size,
            captured_at,
            kind,
            relative_path: None,
            bucket: None,
            content_type: None,
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Builds an entry for a file under `root`.
    ///
    /// Returns `Ok(None)` when the file is not a recognised image or video.
    /// The relative path is the parent directory relative to `root` with a
    /// trailing slash, and the bucket is the name of the parent directory.
    /// Files directly under `root` have neither.
    pub fn from_path(root: &Path, path: &Path, id: MediaId) -> io::Result<Option<Self>> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let kind = match MediaKind::from_extension(extension) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let metadata = fs::metadata(path)?;
        let modified = metadata.modified()?;
        let captured_at: DateTime<Utc> = modified.into();

        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let parent = path.parent();
        let relative_path = parent
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .filter(|rel| !rel.is_empty())
            .map(|rel| format!("{}/", rel));
        let bucket = parent
            .filter(|p| p.strip_prefix(root).map_or(true, |rel| !rel.as_os_str().is_empty()))
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);

        Ok(Some(MediaEntry {
            id,
            location: path.to_path_buf(),
            display_name,
            size: metadata.len(),
            captured_at,
            kind,
            relative_path,
            bucket,
            content_type: content_type_for(extension).map(str::to_string),
        }))
    }
}

impl PartialEq for MediaEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaEntry {}

impl Hash for MediaEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The outcome of one swipe, kept for single-level undo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub entry: MediaEntry,
    pub action: SwipeAction,
}
