//! Filter presets and smart ordering for the review queue

use crate::domain::{MediaEntry, MediaKind};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entries strictly larger than this count as large (50 MiB)
pub const LARGE_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Entries at least this many days old count as old
pub const OLD_AGE_DAYS: i64 = 183;

const SCREENSHOT_MARKER: &str = "screenshot";
const WHATSAPP_MARKER: &str = "whatsapp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPreset {
    #[default]
    All,
    LargeOnly,
    OldOnly,
    Screenshots,
    WhatsappMedia,
    Videos,
}

impl FilterPreset {
    pub const ALL: [FilterPreset; 6] = [
        FilterPreset::All,
        FilterPreset::LargeOnly,
        FilterPreset::OldOnly,
        FilterPreset::Screenshots,
        FilterPreset::WhatsappMedia,
        FilterPreset::Videos,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FilterPreset::All => "All",
            FilterPreset::LargeOnly => "Large (>50 MB)",
            FilterPreset::OldOnly => "Older than 6 months",
            FilterPreset::Screenshots => "Screenshots",
            FilterPreset::WhatsappMedia => "WhatsApp media",
            FilterPreset::Videos => "Videos",
        }
    }

    /// Cycles to the next preset, wrapping around
    pub fn next(&self) -> FilterPreset {
        let index = Self::ALL.iter().position(|p| p == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    fn matches(&self, entry: &MediaEntry, now: DateTime<Utc>) -> bool {
        match self {
            FilterPreset::All => true,
            FilterPreset::LargeOnly => is_large(entry),
            FilterPreset::OldOnly => is_old(entry, now),
            FilterPreset::Screenshots => is_screenshot(entry),
            FilterPreset::WhatsappMedia => is_whatsapp(entry),
            FilterPreset::Videos => entry.kind == MediaKind::Video,
        }
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Applies `preset` to a catalog snapshot.
///
/// The result is ordered by capture time, newest first. The sort is stable,
/// so entries sharing a timestamp keep their snapshot order.
pub fn select(snapshot: &[MediaEntry], preset: FilterPreset, now: DateTime<Utc>) -> Vec<MediaEntry> {
    let mut selected: Vec<MediaEntry> = snapshot
        .iter()
        .filter(|entry| preset.matches(entry, now))
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    selected
}

/// Re-ranks entries so the most worthwhile deletions come first.
///
/// Ties keep their input order.
pub fn apply_smart_order(entries: Vec<MediaEntry>, now: DateTime<Utc>) -> Vec<MediaEntry> {
    let mut scored: Vec<(u64, MediaEntry)> = entries
        .into_iter()
        .map(|entry| (smart_score(&entry, now), entry))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, entry)| entry).collect()
}

/// Deletion-impact score: bigger, older and screenshot/chat-bucketed entries score higher.
///
/// Every component is monotone in its signal, and the category bonus is
/// strictly positive, so an entry that is larger, older and flagged always
/// outranks one that is none of those.
pub fn smart_score(entry: &MediaEntry, now: DateTime<Utc>) -> u64 {
    size_points(entry) + age_points(entry, now) + category_points(entry)
}

fn size_points(entry: &MediaEntry) -> u64 {
    let kib = entry.size / 1024;
    let magnitude = u64::from((kib + 1).ilog2());
    let large_bonus = if is_large(entry) { 40 } else { 0 };
    magnitude * 10 + large_bonus
}

fn age_points(entry: &MediaEntry, now: DateTime<Utc>) -> u64 {
    let days = age_days(entry, now).clamp(0, 730) as u64;
    let old_bonus = if is_old(entry, now) { 40 } else { 0 };
    days / 7 + old_bonus
}

fn category_points(entry: &MediaEntry) -> u64 {
    if is_screenshot(entry) {
        120
    } else if is_whatsapp(entry) {
        100
    } else {
        0
    }
}

/// Sum of entry sizes in bytes
pub fn total_bytes<'a, I>(entries: I) -> u64
where
    I: IntoIterator<Item = &'a MediaEntry>,
{
    entries.into_iter().map(|e| e.size).sum()
}

fn age_days(entry: &MediaEntry, now: DateTime<Utc>) -> i64 {
    (now - entry.captured_at).num_days()
}

fn is_large(entry: &MediaEntry) -> bool {
    entry.size > LARGE_FILE_BYTES
}

fn is_old(entry: &MediaEntry, now: DateTime<Utc>) -> bool {
    now - entry.captured_at >= Duration::days(OLD_AGE_DAYS)
}

fn is_screenshot(entry: &MediaEntry) -> bool {
    contains_ignore_case(entry.relative_path.as_deref(), SCREENSHOT_MARKER)
        || contains_ignore_case(entry.bucket.as_deref(), SCREENSHOT_MARKER)
        || contains_ignore_case(entry.content_type.as_deref(), SCREENSHOT_MARKER)
}

fn is_whatsapp(entry: &MediaEntry) -> bool {
    contains_ignore_case(entry.relative_path.as_deref(), WHATSAPP_MARKER)
        || contains_ignore_case(entry.bucket.as_deref(), WHATSAPP_MARKER)
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle))
        .unwrap_or(false)
}
