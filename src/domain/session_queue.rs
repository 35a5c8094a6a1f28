use super::{ActionRecord, MediaEntry, MediaId, SwipeAction};
use crate::error::{Result, SwipeCleanerError};
use crate::filters::total_bytes;
use std::collections::{HashSet, VecDeque};

/// Coarse state of a review pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been loaded, or the last load was empty
    Empty,
    /// At least one entry is waiting for a decision
    Active,
    /// Every loaded entry has been judged
    Exhausted,
}

/// The review queue together with the delete selection and the undo slot.
///
/// An entry is either pending in `queue` or marked in `selection`, never both.
/// Undo is one level deep: a new swipe overwrites an unconsumed record.
#[derive(Debug, Default)]
pub struct SessionQueue {
    queue: VecDeque<MediaEntry>,
    selection: Vec<MediaEntry>,
    selected_ids: HashSet<MediaId>,
    last_action: Option<ActionRecord>,
    kept_count: usize,
    loaded_count: usize,
}

impl SessionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the queue wholesale and resets selection, undo slot and counters.
    ///
    /// Duplicate identifiers are dropped, keeping the first occurrence.
    pub fn load(&mut self, items: Vec<MediaEntry>) {
        let mut seen = HashSet::with_capacity(items.len());
        self.queue = items.into_iter().filter(|e| seen.insert(e.id)).collect();
        self.selection.clear();
        self.selected_ids.clear();
        self.last_action = None;
        self.kept_count = 0;
        self.loaded_count = self.queue.len();
    }

    pub fn state(&self) -> SessionState {
        if !self.queue.is_empty() {
            SessionState::Active
        } else if self.loaded_count == 0 && self.selection.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Exhausted
        }
    }

    pub fn current_item(&self) -> Option<&MediaEntry> {
        self.queue.front()
    }

    /// Judges the head of the queue
    pub fn act(&mut self, action: SwipeAction) -> Result<ActionRecord> {
        let entry = self.queue.pop_front().ok_or(SwipeCleanerError::EmptyQueue)?;

        match action {
            SwipeAction::Keep => self.kept_count += 1,
            SwipeAction::Delete => self.mark(entry.clone()),
        }

        let record = ActionRecord { entry, action };
        self.last_action = Some(record.clone());
        Ok(record)
    }

    /// Reverts the most recent swipe, putting its entry back at the front
    pub fn undo(&mut self) -> Result<ActionRecord> {
        let record = self
            .last_action
            .take()
            .ok_or(SwipeCleanerError::NothingToUndo)?;

        match record.action {
            SwipeAction::Keep => self.kept_count = self.kept_count.saturating_sub(1),
            SwipeAction::Delete => self.remove_from_selection(record.entry.id),
        }
        self.queue.push_front(record.entry.clone());

        Ok(record)
    }

    /// Drops an entry from the selection without returning it to the queue
    pub fn unmark(&mut self, id: MediaId) {
        self.remove_from_selection(id);
    }

    pub fn selection_snapshot(&self) -> Vec<MediaEntry> {
        self.selection.clone()
    }

    pub fn selection(&self) -> &[MediaEntry] {
        &self.selection
    }

    pub fn selection_bytes(&self) -> u64 {
        total_bytes(&self.selection)
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.queue.len()
    }

    pub fn kept_count(&self) -> usize {
        self.kept_count
    }

    pub fn last_action(&self) -> Option<&ActionRecord> {
        self.last_action.as_ref()
    }

    pub fn is_selected(&self, id: MediaId) -> bool {
        self.selected_ids.contains(&id)
    }

    /// Empties the selection after the catalog confirmed the batch was deleted
    pub fn clear_selection_after_deletion(&mut self) {
        self.selection.clear();
        self.selected_ids.clear();
        self.last_action = None;
    }

    /// Drops the entries the catalog removed, leaving the rest selected.
    ///
    /// Returns the removed entries that were in the selection.
    pub fn remove_deleted(&mut self, removed: &[MediaId]) -> Vec<MediaEntry> {
        let removed: HashSet<MediaId> = removed.iter().copied().collect();
        let (gone, remaining): (Vec<_>, Vec<_>) = self
            .selection
            .drain(..)
            .partition(|e| removed.contains(&e.id));

        if gone.is_empty() {
            self.selection = remaining;
        } else if remaining.is_empty() {
            self.clear_selection_after_deletion();
        } else {
            self.selection = remaining;
            self.selected_ids = self.selection.iter().map(|e| e.id).collect();
            self.last_action = None;
        }
        gone
    }

    /// Clears everything, as after a failed scan
    pub fn reset(&mut self) {
        self.load(Vec::new());
    }

    fn mark(&mut self, entry: MediaEntry) {
        if self.selected_ids.insert(entry.id) {
            self.selection.push(entry);
        }
    }

    fn remove_from_selection(&mut self, id: MediaId) {
        if self.selected_ids.remove(&id) {
            self.selection.retain(|e| e.id != id);
        }
    }
}
