use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use swipe_cleaner::purchase::event_channel;
use swipe_cleaner::{
    DeleteFlow, DeletionSummary, FilesystemCatalog, FilterPreset, JsonPreferenceStore,
    MemoryPreferenceStore, OfflinePurchaseClient, Orchestrator, PreferenceStore, Preferences,
    ScanTrigger, SwipeAction, SwipeCleanerError,
};
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn write_media(dir: &Path, rel: &str, bytes: usize, age: Duration) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, vec![0u8; bytes]).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
    path
}

fn plain_preferences() -> Preferences {
    Preferences {
        smart_mode_enabled: false,
        require_delete_confirmation: false,
        ..Preferences::default()
    }
}

fn dry_run_catalog(root: &Path) -> Arc<FilesystemCatalog> {
    let mut catalog = FilesystemCatalog::new(root);
    catalog.set_dry_run(true);
    Arc::new(catalog)
}

fn current_name<C, P>(app: &Orchestrator<C, P>) -> Option<String>
where
    C: swipe_cleaner::MediaCatalog,
    P: PreferenceStore,
{
    app.current_item().map(|e| e.display_name.clone())
}

#[tokio::test]
async fn test_keep_delete_undo_scenario() {
    let library = TempDir::new().unwrap();
    write_media(library.path(), "oldest.jpg", 10, DAY * 30);
    write_media(library.path(), "newest.jpg", 20, DAY);
    write_media(library.path(), "middle.jpg", 30, DAY * 10);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        dry_run_catalog(library.path()),
        store,
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    app.request_scan(ScanTrigger::Rescan);
    assert_eq!(app.wait_for_scan().await.unwrap().unwrap(), 3);
    assert_eq!(current_name(&app).as_deref(), Some("newest.jpg"));

    app.swipe(SwipeAction::Keep).unwrap();
    assert_eq!(current_name(&app).as_deref(), Some("middle.jpg"));
    assert_eq!(app.view().selected_count, 0);

    app.swipe(SwipeAction::Delete).unwrap();
    let view = app.view();
    assert_eq!(current_name(&app).as_deref(), Some("oldest.jpg"));
    assert_eq!(view.selected_count, 1);
    assert_eq!(view.selected_bytes, 30);

    app.undo().unwrap();
    let view = app.view();
    assert_eq!(current_name(&app).as_deref(), Some("middle.jpg"));
    assert_eq!(view.remaining_count, 2);
    assert_eq!(view.selected_count, 0);
    assert!(view.last_action.is_none());

    assert!(matches!(app.undo(), Err(SwipeCleanerError::NothingToUndo)));
}

#[tokio::test]
async fn test_dry_run_batch_delete_updates_quota_and_keeps_files() {
    let library = TempDir::new().unwrap();
    let big = write_media(library.path(), "DCIM/Camera/big.mp4", 4096, DAY * 2);
    let shot = write_media(library.path(), "Pictures/Screenshots/shot.png", 1024, DAY);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        dry_run_catalog(library.path()),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    app.request_scan(ScanTrigger::Rescan);
    app.wait_for_scan().await.unwrap().unwrap();
    app.swipe(SwipeAction::Delete).unwrap();
    app.swipe(SwipeAction::Delete).unwrap();

    let flow = app.request_delete().await.unwrap();

    assert_eq!(
        flow,
        DeleteFlow::Deleted(DeletionSummary {
            count: 2,
            bytes: 5120
        })
    );
    assert!(big.exists());
    assert!(shot.exists());
    assert_eq!(store.snapshot().free_used_count, 2);
    assert_eq!(app.view().selected_count, 0);
    assert_eq!(
        app.view().info_message.as_deref(),
        Some("Deleted 2 items, freed 5.0 KB")
    );
}

#[tokio::test]
async fn test_screenshot_filter_narrows_queue() {
    let library = TempDir::new().unwrap();
    write_media(library.path(), "DCIM/Camera/a.jpg", 10, DAY * 3);
    write_media(library.path(), "Pictures/Screenshots/b.png", 10, DAY * 2);
    write_media(library.path(), "WhatsApp/Media/WhatsApp Images/c.jpg", 10, DAY);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        dry_run_catalog(library.path()),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    assert!(app.set_filter(FilterPreset::Screenshots));
    assert_eq!(app.wait_for_scan().await.unwrap().unwrap(), 1);
    assert_eq!(current_name(&app).as_deref(), Some("b.png"));

    assert!(app.set_filter(FilterPreset::WhatsappMedia));
    assert_eq!(app.wait_for_scan().await.unwrap().unwrap(), 1);
    assert_eq!(current_name(&app).as_deref(), Some("c.jpg"));
    assert_eq!(store.snapshot().active_filter, FilterPreset::WhatsappMedia);
}

#[tokio::test]
async fn test_platform_confirmation_through_filesystem_catalog() {
    let library = TempDir::new().unwrap();
    write_media(library.path(), "a.jpg", 10, DAY);

    let mut catalog = FilesystemCatalog::new(library.path());
    catalog.set_dry_run(true);
    catalog.set_require_confirmation(true);
    let catalog = Arc::new(catalog);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    app.request_scan(ScanTrigger::Rescan);
    app.wait_for_scan().await.unwrap().unwrap();
    app.swipe(SwipeAction::Delete).unwrap();

    let token = match app.request_delete().await.unwrap() {
        DeleteFlow::AwaitingPlatformConfirmation(token) => token,
        other => panic!("unexpected flow {:?}", other),
    };
    assert_eq!(catalog.pending_len(token), Some(1));

    let removed = catalog.complete_confirmation(token).await.unwrap();
    assert_eq!(removed.len(), 1);
    let flow = app.on_platform_confirmation(token, Some(&removed)).unwrap();

    assert!(matches!(flow, DeleteFlow::Deleted(_)));
    assert_eq!(store.snapshot().free_used_count, 1);
}

#[tokio::test]
async fn test_platform_confirmation_that_trashes_nothing_keeps_selection() {
    let library = TempDir::new().unwrap();
    let photo = write_media(library.path(), "a.jpg", 10, DAY);

    let mut catalog = FilesystemCatalog::new(library.path());
    catalog.set_dry_run(true);
    catalog.set_require_confirmation(true);
    let catalog = Arc::new(catalog);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    app.request_scan(ScanTrigger::Rescan);
    app.wait_for_scan().await.unwrap().unwrap();
    app.swipe(SwipeAction::Delete).unwrap();

    let token = match app.request_delete().await.unwrap() {
        DeleteFlow::AwaitingPlatformConfirmation(token) => token,
        other => panic!("unexpected flow {:?}", other),
    };

    // The file disappears before the user approves, so nothing gets trashed
    fs::remove_file(&photo).unwrap();
    let removed = catalog.complete_confirmation(token).await.unwrap();
    assert!(removed.is_empty());

    let result = app.on_platform_confirmation(token, Some(&removed));

    assert!(matches!(result, Err(SwipeCleanerError::DeletionFailed(_))));
    assert_eq!(app.view().selected_count, 1);
    assert_eq!(store.snapshot().free_used_count, 0);
    assert!(!app.view().awaiting_platform_confirmation);
}

#[tokio::test]
async fn test_declined_platform_confirmation_runs_held_scan() {
    let library = TempDir::new().unwrap();
    write_media(library.path(), "a.jpg", 10, DAY * 2);
    write_media(library.path(), "b.jpg", 10, DAY);

    let mut catalog = FilesystemCatalog::new(library.path());
    catalog.set_dry_run(true);
    catalog.set_require_confirmation(true);
    let catalog = Arc::new(catalog);

    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        Arc::clone(&catalog),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, false)),
        rx,
    );

    app.request_scan(ScanTrigger::Rescan);
    app.wait_for_scan().await.unwrap().unwrap();
    app.swipe(SwipeAction::Delete).unwrap();

    let token = match app.request_delete().await.unwrap() {
        DeleteFlow::AwaitingPlatformConfirmation(token) => token,
        other => panic!("unexpected flow {:?}", other),
    };

    app.request_scan(ScanTrigger::Rescan);
    assert!(!app.view().is_loading);
    assert_eq!(app.view().selected_count, 1);

    catalog.cancel_confirmation(token);
    let result = app.on_platform_confirmation(token, None);

    assert!(matches!(result, Err(SwipeCleanerError::DeletionCanceled)));
    assert_eq!(catalog.pending_len(token), None);
    assert!(app.view().is_loading);
    assert_eq!(app.wait_for_scan().await.unwrap().unwrap(), 2);
    assert_eq!(app.view().selected_count, 0);
    assert_eq!(store.snapshot().free_used_count, 0);
}

#[tokio::test]
async fn test_preferences_survive_restart() {
    let library = TempDir::new().unwrap();
    write_media(library.path(), "a.jpg", 10, DAY);
    let config_dir = TempDir::new().unwrap();
    let prefs_path = config_dir.path().join("preferences.json");

    {
        let store = JsonPreferenceStore::new(&prefs_path);
        let (tx, rx) = event_channel();
        let mut app = Orchestrator::new(
            dry_run_catalog(library.path()),
            store,
            Box::new(OfflinePurchaseClient::new(tx, false)),
            rx,
        );
        app.set_smart_mode(false);
        app.set_require_delete_confirmation(false);
        app.set_filter(FilterPreset::OldOnly);
        app.complete_onboarding();
    }

    let saved = JsonPreferenceStore::new(&prefs_path).load().unwrap();
    assert!(!saved.smart_mode_enabled);
    assert!(!saved.require_delete_confirmation);
    assert_eq!(saved.active_filter, FilterPreset::OldOnly);
    assert!(saved.has_seen_onboarding);
}

#[tokio::test]
async fn test_restore_purchases_unlocks_pro() {
    let store = Arc::new(MemoryPreferenceStore::new(plain_preferences()));
    let library = TempDir::new().unwrap();
    let (tx, rx) = event_channel();
    let mut app = Orchestrator::new(
        dry_run_catalog(library.path()),
        Arc::clone(&store),
        Box::new(OfflinePurchaseClient::new(tx, true)),
        rx,
    );

    app.restore_purchases();
    app.process_purchase_events();

    assert!(app.view().quota.is_pro_unlocked);
    assert_eq!(app.view().info_message.as_deref(), Some("Purchases restored"));
    assert!(store.snapshot().is_pro_unlocked);
}
