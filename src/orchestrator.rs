//! Coordinates scanning, swiping, deletion and purchases for one session

use crate::catalog::{ConfirmationToken, DeleteOutcome, MediaCatalog};
use crate::config::{PreferenceStore, Preferences};
use crate::domain::{ActionRecord, MediaEntry, MediaId, SessionQueue, SwipeAction};
use crate::error::{CatalogError, Result, ScanFailure, SwipeCleanerError};
use crate::filters::{self, FilterPreset};
use crate::format::bytes_to_human_readable;
use crate::purchase::{PurchaseClient, PurchaseEvent, PurchaseEventReceiver};
use crate::quota::{self, QuotaDecision, QuotaState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Quiet period used to coalesce bursts of filter changes
pub const SCAN_DEBOUNCE: Duration = Duration::from_millis(250);

/// Why a scan was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    /// Explicit user rescan: fresh catalog read, no debounce
    Rescan,
    /// Filter preset changed: fresh catalog read, debounced
    FilterChange,
    /// Ordering settings changed: reuse the cached snapshot, debounced
    SettingsChange,
}

impl ScanTrigger {
    fn forces_fetch(&self) -> bool {
        matches!(self, ScanTrigger::Rescan | ScanTrigger::FilterChange)
    }

    fn is_debounced(&self) -> bool {
        !matches!(self, ScanTrigger::Rescan)
    }

    /// The trigger that covers both requests
    fn merge(self, other: ScanTrigger) -> ScanTrigger {
        fn rank(trigger: ScanTrigger) -> u8 {
            match trigger {
                ScanTrigger::SettingsChange => 0,
                ScanTrigger::FilterChange => 1,
                ScanTrigger::Rescan => 2,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionSummary {
    pub count: usize,
    pub bytes: u64,
}

/// Where a delete request ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteFlow {
    /// Nothing to do: empty selection or a batch is already in flight
    Idle,
    /// The user must confirm before the batch is submitted
    NeedsConfirmation { count: usize, bytes: u64 },
    /// Free quota exhausted; show the paywall
    Paywall { message: Option<String> },
    /// The catalog wants its own confirmation for this batch
    AwaitingPlatformConfirmation(ConfirmationToken),
    Deleted(DeletionSummary),
}

/// Read-only picture of the session for a front end
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub current_item: Option<MediaEntry>,
    pub remaining_count: usize,
    pub selected_count: usize,
    pub selected_bytes: u64,
    pub kept_count: usize,
    pub last_action: Option<ActionRecord>,
    pub is_loading: bool,
    pub info_message: Option<String>,
    pub scan_error: Option<ScanFailure>,
    pub active_filter: FilterPreset,
    pub smart_mode_enabled: bool,
    pub quota: QuotaState,
    pub show_paywall: bool,
    pub paywall_message: Option<String>,
    pub confirmation_requested: bool,
    pub awaiting_platform_confirmation: bool,
    pub last_deletion: Option<DeletionSummary>,
}

#[derive(Debug)]
struct ScanOutcome {
    generation: u64,
    result: std::result::Result<Arc<Vec<MediaEntry>>, CatalogError>,
}

enum ScanWait {
    Outcome(Option<ScanOutcome>),
    TaskEnded(std::result::Result<(), JoinError>),
}

#[derive(Debug, Clone, Copy)]
struct PendingDeletion {
    token: ConfirmationToken,
    count: usize,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the session state and is its only mutator.
///
/// Scans run on spawned tasks; only the result of the most recently requested
/// scan is ever applied. Must be used inside a tokio runtime.
pub struct Orchestrator<C: MediaCatalog, P: PreferenceStore> {
    catalog: Arc<C>,
    store: P,
    purchases: Box<dyn PurchaseClient>,
    purchase_events: PurchaseEventReceiver,
    preferences: Preferences,
    session: SessionQueue,
    clock: Clock,

    cached_snapshot: Option<Arc<Vec<MediaEntry>>>,
    scan_generation: u64,
    scan_task: Option<JoinHandle<()>>,
    scan_tx: mpsc::UnboundedSender<ScanOutcome>,
    scan_rx: mpsc::UnboundedReceiver<ScanOutcome>,
    last_debounced_scan: Option<Instant>,
    /// Scan requested while a batch awaited confirmation
    deferred_scan: Option<ScanTrigger>,
    is_loading: bool,

    pending_deletion: Option<PendingDeletion>,
    confirmation_requested: bool,
    awaiting_restore: bool,

    info_message: Option<String>,
    scan_error: Option<ScanFailure>,
    show_paywall: bool,
    paywall_message: Option<String>,
    last_deletion: Option<DeletionSummary>,
}

impl<C: MediaCatalog, P: PreferenceStore> Orchestrator<C, P> {
    /// Loads preferences from `store`; a failed load falls back to defaults
    pub fn new(
        catalog: Arc<C>,
        store: P,
        purchases: Box<dyn PurchaseClient>,
        purchase_events: PurchaseEventReceiver,
    ) -> Self {
        let preferences = store.load().unwrap_or_else(|e| {
            warn!("Failed to load preferences, using defaults: {}", e);
            Preferences::default()
        });
        let (scan_tx, scan_rx) = mpsc::unbounded_channel();

        Self {
            catalog,
            store,
            purchases,
            purchase_events,
            preferences,
            session: SessionQueue::new(),
            clock: Box::new(Utc::now),
            cached_snapshot: None,
            scan_generation: 0,
            scan_task: None,
            scan_tx,
            scan_rx,
            last_debounced_scan: None,
            deferred_scan: None,
            is_loading: false,
            pending_deletion: None,
            confirmation_requested: false,
            awaiting_restore: false,
            info_message: None,
            scan_error: None,
            show_paywall: false,
            paywall_message: None,
            last_deletion: None,
        }
    }

    /// Replaces the reference clock used for age-based filtering
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn session(&self) -> &SessionQueue {
        &self.session
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn current_item(&self) -> Option<&MediaEntry> {
        self.session.current_item()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            current_item: self.session.current_item().cloned(),
            remaining_count: self.session.remaining_count(),
            selected_count: self.session.selected_count(),
            selected_bytes: self.session.selection_bytes(),
            kept_count: self.session.kept_count(),
            last_action: self.session.last_action().cloned(),
            is_loading: self.is_loading,
            info_message: self.info_message.clone(),
            scan_error: self.scan_error,
            active_filter: self.preferences.active_filter,
            smart_mode_enabled: self.preferences.smart_mode_enabled,
            quota: self.preferences.quota(),
            show_paywall: self.show_paywall,
            paywall_message: self.paywall_message.clone(),
            confirmation_requested: self.confirmation_requested,
            awaiting_platform_confirmation: self.pending_deletion.is_some(),
            last_deletion: self.last_deletion,
        }
    }

    // --- scanning ---

    /// Starts a scan, superseding any scan still in flight.
    ///
    /// While a batch awaits confirmation the scan is held back and started
    /// once the batch is resolved, so the pending selection stays intact.
    pub fn request_scan(&mut self, trigger: ScanTrigger) {
        if self.pending_deletion.is_some() {
            let deferred = match self.deferred_scan {
                Some(earlier) => earlier.merge(trigger),
                None => trigger,
            };
            debug!("Deferring {:?} scan until the pending batch resolves", deferred);
            self.deferred_scan = Some(deferred);
            return;
        }

        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.scan_generation += 1;
        let generation = self.scan_generation;

        let delay = if trigger.is_debounced() {
            self.debounce_delay()
        } else {
            Duration::ZERO
        };
        let cached = if trigger.forces_fetch() {
            None
        } else {
            self.cached_snapshot.clone()
        };

        debug!(
            "Scan #{} requested ({:?}, delay {:?}, cached: {})",
            generation,
            trigger,
            delay,
            cached.is_some()
        );

        self.is_loading = true;
        self.scan_error = None;
        self.info_message = Some("Scanning library...".to_string());

        let catalog = Arc::clone(&self.catalog);
        let tx = self.scan_tx.clone();
        self.scan_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = match cached {
                Some(snapshot) => Ok(snapshot),
                None => catalog.scan().await.map(Arc::new),
            };
            // The receiver only goes away with the orchestrator
            let _ = tx.send(ScanOutcome { generation, result });
        }));
    }

    /// Waits for the latest requested scan and applies it.
    ///
    /// Returns the number of queued entries, or `None` when no scan is in flight.
    pub async fn wait_for_scan(&mut self) -> Option<Result<usize>> {
        while self.is_loading {
            let waited = match self.scan_task.as_mut() {
                Some(task) => tokio::select! {
                    biased;
                    outcome = self.scan_rx.recv() => ScanWait::Outcome(outcome),
                    joined = task => ScanWait::TaskEnded(joined),
                },
                None => ScanWait::Outcome(self.scan_rx.recv().await),
            };

            match waited {
                ScanWait::Outcome(Some(outcome)) => {
                    if let Some(applied) = self.apply_scan_outcome(outcome) {
                        return Some(applied);
                    }
                }
                ScanWait::Outcome(None) => return None,
                ScanWait::TaskEnded(joined) => {
                    self.scan_task = None;
                    while let Ok(outcome) = self.scan_rx.try_recv() {
                        if let Some(applied) = self.apply_scan_outcome(outcome) {
                            return Some(applied);
                        }
                    }
                    return Some(self.fail_lost_scan(joined.err()));
                }
            }
        }
        None
    }

    /// Applies a finished scan if one is ready, without waiting
    pub fn poll_scan(&mut self) -> Option<Result<usize>> {
        while let Ok(outcome) = self.scan_rx.try_recv() {
            if let Some(applied) = self.apply_scan_outcome(outcome) {
                return Some(applied);
            }
        }

        let task_gone = self
            .scan_task
            .as_ref()
            .map_or(true, |task| task.is_finished());
        if self.is_loading && task_gone {
            // The outcome is sent before the task ends, so one more look settles it
            if let Ok(outcome) = self.scan_rx.try_recv() {
                if let Some(applied) = self.apply_scan_outcome(outcome) {
                    return Some(applied);
                }
            }
            self.scan_task = None;
            return Some(self.fail_lost_scan(None));
        }
        None
    }

    /// Resolves a scan whose task ended without reporting, e.g. after a panic
    fn fail_lost_scan(&mut self, join_error: Option<JoinError>) -> Result<usize> {
        let reason = match join_error {
            Some(e) => format!("scan task failed: {}", e),
            None => "scan task ended without a result".to_string(),
        };
        let outcome = ScanOutcome {
            generation: self.scan_generation,
            result: Err(CatalogError::QueryError(reason)),
        };
        self.apply_scan_outcome(outcome)
            .unwrap_or(Err(SwipeCleanerError::ScanFailed(ScanFailure::Generic)))
    }

    /// Drops any in-flight scan so it can't reload the session under a pending batch
    fn suspend_scan(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
            self.scan_generation += 1;
            self.is_loading = false;
            self.info_message = None;
            self.deferred_scan = Some(ScanTrigger::Rescan);
            debug!("In-flight scan suspended until the pending batch resolves");
        }
    }

    fn resume_deferred_scan(&mut self) {
        if let Some(trigger) = self.deferred_scan.take() {
            self.request_scan(trigger);
        }
    }

    fn debounce_delay(&mut self) -> Duration {
        let now = Instant::now();
        let delay = match self.last_debounced_scan {
            Some(last) if last > now => SCAN_DEBOUNCE,
            Some(last) => SCAN_DEBOUNCE.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        };
        self.last_debounced_scan = Some(now + delay);
        delay
    }

    fn apply_scan_outcome(&mut self, outcome: ScanOutcome) -> Option<Result<usize>> {
        if outcome.generation != self.scan_generation {
            debug!(
                "Discarding stale scan #{} (current #{})",
                outcome.generation, self.scan_generation
            );
            return None;
        }

        self.scan_task = None;
        self.is_loading = false;
        self.confirmation_requested = false;

        match outcome.result {
            Ok(snapshot) => {
                let now = (self.clock)();
                let filtered = filters::select(&snapshot, self.preferences.active_filter, now);
                let ordered = if self.preferences.smart_mode_enabled {
                    filters::apply_smart_order(filtered, now)
                } else {
                    filtered
                };
                let count = ordered.len();

                self.session.load(ordered);
                self.cached_snapshot = Some(snapshot);
                self.scan_error = None;
                self.last_deletion = None;
                self.info_message = Some(format!("Scanned {} items", count));
                info!(
                    "Scan #{} applied: {} items queued ({})",
                    outcome.generation, count, self.preferences.active_filter
                );
                Some(Ok(count))
            }
            Err(err) => {
                warn!("Scan #{} failed: {}", outcome.generation, err);
                let failure = err.scan_failure();
                self.session.reset();
                self.scan_error = Some(failure);
                self.info_message = None;
                Some(Err(err.into()))
            }
        }
    }

    // --- settings ---

    /// Switches the filter preset and rescans; returns false if it was already active
    pub fn set_filter(&mut self, preset: FilterPreset) -> bool {
        if self.preferences.active_filter == preset {
            return false;
        }
        self.preferences.active_filter = preset;
        self.persist();
        self.request_scan(ScanTrigger::FilterChange);
        true
    }

    /// Toggles smart ordering; enabling it also resets the filter to `All`
    pub fn set_smart_mode(&mut self, enabled: bool) {
        self.preferences.smart_mode_enabled = enabled;
        if enabled {
            self.preferences.active_filter = FilterPreset::All;
        }
        self.info_message = None;
        self.persist();
        self.request_scan(ScanTrigger::SettingsChange);
    }

    pub fn set_require_delete_confirmation(&mut self, required: bool) {
        self.preferences.require_delete_confirmation = required;
        self.persist();
    }

    pub fn complete_onboarding(&mut self) {
        self.preferences.has_seen_onboarding = true;
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.preferences) {
            warn!("Failed to save preferences: {}", e);
        }
    }

    // --- swiping ---

    pub fn swipe(&mut self, action: SwipeAction) -> Result<ActionRecord> {
        self.ensure_no_pending_deletion()?;
        let record = self.session.act(action)?;
        self.info_message = None;
        debug!("{} {}", action, record.entry.id);
        Ok(record)
    }

    pub fn undo(&mut self) -> Result<ActionRecord> {
        self.ensure_no_pending_deletion()?;
        let record = self.session.undo()?;
        self.info_message = Some(format!("Undid {}", record.action));
        Ok(record)
    }

    /// Removes an entry from the selection; it does not return to the queue
    pub fn unmark(&mut self, id: MediaId) -> Result<()> {
        self.ensure_no_pending_deletion()?;
        self.session.unmark(id);
        Ok(())
    }

    fn ensure_no_pending_deletion(&self) -> Result<()> {
        if self.pending_deletion.is_some() {
            return Err(SwipeCleanerError::DeletionInProgress);
        }
        Ok(())
    }

    // --- deletion ---

    /// Starts deleting the selection, asking for confirmation first if configured
    pub async fn request_delete(&mut self) -> Result<DeleteFlow> {
        if self.session.selected_count() == 0 || self.pending_deletion.is_some() {
            return Ok(DeleteFlow::Idle);
        }

        if self.preferences.require_delete_confirmation {
            self.confirmation_requested = true;
            return Ok(DeleteFlow::NeedsConfirmation {
                count: self.session.selected_count(),
                bytes: self.session.selection_bytes(),
            });
        }

        self.confirm_deletion().await
    }

    pub fn dismiss_confirmation(&mut self) {
        self.confirmation_requested = false;
    }

    /// Checks the quota and hands the selection to the catalog.
    ///
    /// On any failure the selection and quota are left exactly as they were.
    pub async fn confirm_deletion(&mut self) -> Result<DeleteFlow> {
        if self.session.selected_count() == 0 || self.pending_deletion.is_some() {
            return Ok(DeleteFlow::Idle);
        }
        self.confirmation_requested = false;

        let batch = self.session.selection_snapshot();
        if quota::evaluate(&self.preferences.quota(), batch.len()) == QuotaDecision::Deny {
            let message = self.purchases.availability_message();
            info!(
                "Batch of {} denied by free quota ({} used)",
                batch.len(),
                self.preferences.free_used_count
            );
            self.show_paywall = true;
            self.paywall_message = message.clone();
            return Ok(DeleteFlow::Paywall { message });
        }

        match self.catalog.delete(&batch).await {
            Ok(DeleteOutcome::Deleted(removed)) => match self.finish_deletion(&removed, batch.len()) {
                Some(summary) => Ok(DeleteFlow::Deleted(summary)),
                None => Err(self.fail_deletion("no items were deleted".to_string())),
            },
            Ok(DeleteOutcome::NeedsConfirmation(token)) => {
                debug!("Batch of {} awaiting platform confirmation", batch.len());
                self.suspend_scan();
                self.pending_deletion = Some(PendingDeletion {
                    token,
                    count: batch.len(),
                });
                Ok(DeleteFlow::AwaitingPlatformConfirmation(token))
            }
            Err(e) => Err(self.fail_deletion(e.to_string())),
        }
    }

    /// Resolves a batch that was waiting on the catalog's own confirmation step.
    ///
    /// `removed` is `None` when the user declined, otherwise the entries the
    /// catalog actually removed. An empty list is a failed deletion. Unknown
    /// tokens are ignored.
    pub fn on_platform_confirmation(
        &mut self,
        token: ConfirmationToken,
        removed: Option<&[MediaId]>,
    ) -> Result<DeleteFlow> {
        let pending = match self.pending_deletion {
            Some(pending) if pending.token == token => pending,
            _ => {
                debug!("Ignoring confirmation for unknown batch {:?}", token);
                return Ok(DeleteFlow::Idle);
            }
        };
        self.pending_deletion = None;

        let result = match removed {
            None => {
                info!("Deletion of {} items canceled", pending.count);
                self.info_message = Some("Deletion canceled".to_string());
                Err(SwipeCleanerError::DeletionCanceled)
            }
            Some(removed) => match self.finish_deletion(removed, pending.count) {
                Some(summary) => Ok(DeleteFlow::Deleted(summary)),
                None => Err(self.fail_deletion("no items were deleted".to_string())),
            },
        };

        self.resume_deferred_scan();
        result
    }

    fn fail_deletion(&mut self, reason: String) -> SwipeCleanerError {
        warn!("Deletion failed: {}", reason);
        self.info_message = Some("Could not delete the selected items".to_string());
        SwipeCleanerError::DeletionFailed(reason)
    }

    /// Charges quota for the removed entries and drops them from the session.
    ///
    /// Entries the catalog did not remove stay selected. Returns `None` when
    /// nothing in the selection was removed.
    fn finish_deletion(&mut self, removed: &[MediaId], batch_len: usize) -> Option<DeletionSummary> {
        let gone = self.session.remove_deleted(removed);
        if gone.is_empty() {
            return None;
        }

        let summary = DeletionSummary {
            count: gone.len(),
            bytes: filters::total_bytes(&gone),
        };
        let updated = quota::apply_usage(&self.preferences.quota(), summary.count);
        self.preferences.set_quota(updated);
        self.persist();

        if let Some(snapshot) = self.cached_snapshot.as_mut() {
            Arc::make_mut(snapshot).retain(|e| !gone.contains(e));
        }

        self.last_deletion = Some(summary);
        self.info_message = Some(if summary.count < batch_len {
            warn!("Catalog deleted {} of {} entries", summary.count, batch_len);
            format!(
                "Deleted {} of {} items, freed {}",
                summary.count,
                batch_len,
                bytes_to_human_readable(summary.bytes)
            )
        } else {
            format!(
                "Deleted {} items, freed {}",
                summary.count,
                bytes_to_human_readable(summary.bytes)
            )
        });
        info!(
            "Deleted {} items ({} bytes), free usage now {}",
            summary.count, summary.bytes, updated.free_used_count
        );

        // A scan started before the deletion would bring the removed entries back
        if self.is_loading {
            self.request_scan(ScanTrigger::Rescan);
        }
        Some(summary)
    }

    // --- purchases ---

    pub fn close_paywall(&mut self) {
        self.show_paywall = false;
        self.paywall_message = None;
    }

    pub fn buy_pro(&mut self) {
        if self.purchases.launch_purchase_flow() {
            return;
        }
        let message = self
            .purchases
            .availability_message()
            .unwrap_or_else(|| "Purchase is not ready yet. Try again later.".to_string());
        self.info_message = Some(message.clone());
        self.show_paywall = true;
        self.paywall_message = Some(message);
    }

    pub fn restore_purchases(&mut self) {
        self.awaiting_restore = true;
        self.info_message = Some("Restoring purchases...".to_string());
        self.purchases.query_purchases();
    }

    /// Applies every purchase event received so far; returns how many were handled
    pub fn process_purchase_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.purchase_events.try_recv() {
            self.handle_purchase_event(event);
            handled += 1;
        }
        handled
    }

    fn handle_purchase_event(&mut self, event: PurchaseEvent) {
        match event {
            PurchaseEvent::ProStatusChanged(unlocked) => {
                info!("Pro status changed: {}", unlocked);
                self.preferences.is_pro_unlocked = unlocked;
                self.persist();

                let message = match (self.awaiting_restore, unlocked) {
                    (true, true) => Some("Purchases restored"),
                    (true, false) => Some("No purchases found"),
                    (false, true) => Some("Pro unlocked"),
                    (false, false) => None,
                };
                self.awaiting_restore = false;
                self.info_message = message.map(str::to_string);

                if unlocked {
                    self.show_paywall = false;
                    self.paywall_message = None;
                }
            }
            PurchaseEvent::Message(message) => {
                debug!("Billing message: {}", message);
                self.info_message = Some(message);
            }
        }
    }
}

impl<C: MediaCatalog, P: PreferenceStore> Drop for Orchestrator<C, P> {
    fn drop(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
    }
}
