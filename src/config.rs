//! User preferences and their persistence

use crate::error::{Result, SwipeCleanerError};
use crate::filters::FilterPreset;
use crate::quota::QuotaState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub free_used_count: u32,
    pub is_pro_unlocked: bool,
    /// Ask before submitting a deletion batch
    pub require_delete_confirmation: bool,
    pub smart_mode_enabled: bool,
    pub active_filter: FilterPreset,
    pub has_seen_onboarding: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            free_used_count: 0,
            is_pro_unlocked: false,
            require_delete_confirmation: true,
            smart_mode_enabled: true,
            active_filter: FilterPreset::All,
            has_seen_onboarding: false,
        }
    }
}

impl Preferences {
    pub fn quota(&self) -> QuotaState {
        QuotaState {
            free_used_count: self.free_used_count,
            is_pro_unlocked: self.is_pro_unlocked,
        }
    }

    pub fn set_quota(&mut self, quota: QuotaState) {
        self.free_used_count = quota.free_used_count;
        self.is_pro_unlocked = quota.is_pro_unlocked;
    }
}

/// Where preferences live between runs
pub trait PreferenceStore {
    fn load(&self) -> Result<Preferences>;
    fn save(&self, preferences: &Preferences) -> Result<()>;
}

/// Stores preferences as JSON (by default `~/.config/swipe-cleaner/preferences.json`)
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config directory
    pub fn in_config_dir() -> Result<Self> {
        let path = Self::default_path().ok_or_else(|| {
            SwipeCleanerError::ConfigError("Could not determine config directory".to_string())
        })?;
        Ok(Self::new(path))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("swipe-cleaner").join("preferences.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl PreferenceStore for JsonPreferenceStore {
    /// Missing file yields defaults
    fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            SwipeCleanerError::ConfigError(format!("Failed to read preferences file: {}", e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            SwipeCleanerError::ConfigError(format!("Failed to parse preferences file: {}", e))
        })
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SwipeCleanerError::ConfigError(format!(
                    "Failed to create config directory: {}",
                    e
                ))
            })?;
        }

        let contents = serde_json::to_string_pretty(preferences).map_err(|e| {
            SwipeCleanerError::ConfigError(format!("Failed to serialize preferences: {}", e))
        })?;

        fs::write(&self.path, contents).map_err(|e| {
            SwipeCleanerError::ConfigError(format!("Failed to write preferences file: {}", e))
        })?;

        Ok(())
    }
}

/// Keeps preferences in memory; used by tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            inner: Mutex::new(preferences),
        }
    }

    pub fn snapshot(&self) -> Preferences {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences> {
        Ok(self.snapshot())
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| SwipeCleanerError::ConfigError("Preference lock poisoned".to_string()))?;
        *guard = preferences.clone();
        Ok(())
    }
}

impl<S: PreferenceStore + ?Sized> PreferenceStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Preferences> {
        (**self).load()
    }

    fn save(&self, preferences: &Preferences) -> Result<()> {
        (**self).save(preferences)
    }
}
