use swipe_cleaner::cli::{AppConfig, Args};
use swipe_cleaner::config::JsonPreferenceStore;
use swipe_cleaner::format::{bytes_to_human_readable, date_to_short};
use swipe_cleaner::input::{handle_confirm_input, handle_key_event, KeyAction};
use swipe_cleaner::orchestrator::{DeleteFlow, Orchestrator, ScanTrigger, SessionView};
use swipe_cleaner::purchase::{event_channel, OfflinePurchaseClient};
use swipe_cleaner::quota;
use swipe_cleaner::{ConfirmationToken, FilesystemCatalog, SwipeAction, SwipeCleanerError};

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type App = Orchestrator<FilesystemCatalog, JsonPreferenceStore>;

/// What the next key press answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    None,
    ConfirmDelete,
    PlatformConfirm(ConfirmationToken),
    Paywall,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "swipe_cleaner=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config: AppConfig = args.into();
    run_app_with_config(&config).await
}

/// Runs the interactive session with configuration
async fn run_app_with_config(config: &AppConfig) -> io::Result<()> {
    let mut catalog = FilesystemCatalog::new(config.directory.clone());
    catalog.set_dry_run(config.dry_run);
    catalog.set_show_hidden(config.show_hidden);
    catalog.set_require_confirmation(config.platform_confirm);
    let catalog = Arc::new(catalog);
    info!("Scanning {}", catalog.root().display());

    let store = match &config.config_path {
        Some(path) => JsonPreferenceStore::new(path.clone()),
        None => JsonPreferenceStore::in_config_dir().map_err(|e| io::Error::other(e.to_string()))?,
    };
    info!("Using preferences at {}", store.path().display());

    let (events_tx, events_rx) = event_channel();
    let purchases = OfflinePurchaseClient::new(events_tx, config.pro);
    let mut app = Orchestrator::new(Arc::clone(&catalog), store, Box::new(purchases), events_rx);

    if let Some(smart) = config.smart_mode {
        app.set_smart_mode(smart);
    }
    if let Some(filter) = config.filter {
        app.set_filter(filter);
    }
    if config.pro {
        app.restore_purchases();
    }
    app.request_scan(ScanTrigger::Rescan);

    if catalog.is_dry_run() {
        println!("[DRY RUN] No files will be moved to trash");
    }
    if !app.preferences().has_seen_onboarding {
        println!("Swipe right (k) to keep, left (d) to queue for deletion.");
        println!("Press D to delete the queued batch and ? for all keys.");
        app.complete_onboarding();
    }

    enable_raw_mode()?;
    let result = run_loop(&mut app, &catalog, config).await;
    disable_raw_mode()?;

    let view = app.view();
    println!();
    println!(
        "Kept {} items, {} queued for deletion ({})",
        view.kept_count,
        view.selected_count,
        bytes_to_human_readable(view.selected_bytes)
    );

    result
}

/// Main application loop
async fn run_loop(
    app: &mut App,
    catalog: &Arc<FilesystemCatalog>,
    config: &AppConfig,
) -> io::Result<()> {
    let mut prompt = Prompt::None;
    let mut last_view: Option<SessionView> = None;

    loop {
        app.poll_scan();
        app.process_purchase_events();

        let view = app.view();
        if last_view.as_ref() != Some(&view) {
            print_status(&view, prompt)?;
            last_view = Some(view);
        }

        if !event::poll(Duration::from_millis(50))? {
            tokio::task::yield_now().await;
            continue;
        }
        let key = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => continue,
        };

        match prompt {
            Prompt::ConfirmDelete => {
                prompt = Prompt::None;
                match handle_confirm_input(key) {
                    KeyAction::Confirm => {
                        let flow = app.confirm_deletion().await;
                        prompt = handle_delete_flow(flow, config)?;
                    }
                    _ => app.dismiss_confirmation(),
                }
                last_view = None;
                continue;
            }
            Prompt::PlatformConfirm(token) => {
                prompt = Prompt::None;
                let removed = if handle_confirm_input(key) == KeyAction::Confirm {
                    match catalog.complete_confirmation(token).await {
                        Ok(removed) => {
                            info!("Trashed {} files", removed.len());
                            Some(removed)
                        }
                        Err(e) => {
                            error!("Trash failed: {}", e);
                            Some(Vec::new())
                        }
                    }
                } else {
                    catalog.cancel_confirmation(token);
                    None
                };
                report(app.on_platform_confirmation(token, removed.as_deref()))?;
                last_view = None;
                continue;
            }
            Prompt::Paywall => {
                prompt = Prompt::None;
                if handle_key_event(key) == KeyAction::BuyPro {
                    app.buy_pro();
                } else {
                    app.close_paywall();
                }
                last_view = None;
                continue;
            }
            Prompt::None => {}
        }

        match handle_key_event(key) {
            KeyAction::Quit => break,
            KeyAction::Keep => report(app.swipe(SwipeAction::Keep))?,
            KeyAction::Delete => report(app.swipe(SwipeAction::Delete))?,
            KeyAction::Undo => report(app.undo())?,
            KeyAction::Unmark => {
                let last = app.session().selection().last().map(|e| e.id);
                if let Some(id) = last {
                    report(app.unmark(id))?;
                }
            }
            KeyAction::DeleteBatch => {
                let flow = app.request_delete().await;
                prompt = handle_delete_flow(flow, config)?;
                if prompt == Prompt::ConfirmDelete && config.require_confirmation == Some(false) {
                    let flow = app.confirm_deletion().await;
                    prompt = handle_delete_flow(flow, config)?;
                }
            }
            KeyAction::Rescan => app.request_scan(ScanTrigger::Rescan),
            KeyAction::CycleFilter => {
                let next = app.preferences().active_filter.next();
                app.set_filter(next);
            }
            KeyAction::ToggleSmart => {
                let enabled = !app.preferences().smart_mode_enabled;
                app.set_smart_mode(enabled);
            }
            KeyAction::ToggleConfirmation => {
                let required = !app.preferences().require_delete_confirmation;
                app.set_require_delete_confirmation(required);
            }
            KeyAction::BuyPro => app.buy_pro(),
            KeyAction::RestorePurchases => app.restore_purchases(),
            KeyAction::Help => print_help()?,
            KeyAction::Confirm | KeyAction::Cancel | KeyAction::None => {}
        }

        if app.view().show_paywall {
            prompt = Prompt::Paywall;
        }
        last_view = None;
    }

    Ok(())
}

fn handle_delete_flow(
    flow: swipe_cleaner::Result<DeleteFlow>,
    config: &AppConfig,
) -> io::Result<Prompt> {
    let prompt = match flow {
        Ok(DeleteFlow::NeedsConfirmation { count, bytes }) => {
            if config.require_confirmation != Some(false) {
                print_line(&format!(
                    "Delete {} items ({})? [y/n]",
                    count,
                    bytes_to_human_readable(bytes)
                ))?;
            }
            Prompt::ConfirmDelete
        }
        Ok(DeleteFlow::AwaitingPlatformConfirmation(token)) => {
            print_line("Move the batch to the trash? [y/n]")?;
            Prompt::PlatformConfirm(token)
        }
        Ok(DeleteFlow::Paywall { .. }) => Prompt::Paywall,
        Ok(DeleteFlow::Deleted(_)) | Ok(DeleteFlow::Idle) => Prompt::None,
        Err(e) => {
            print_line(&format!("Error: {}", e))?;
            Prompt::None
        }
    };
    Ok(prompt)
}

fn report<T>(result: swipe_cleaner::Result<T>) -> io::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(SwipeCleanerError::EmptyQueue) | Err(SwipeCleanerError::NothingToUndo) => Ok(()),
        Err(e) => print_line(&format!("{}", e)),
    }
}

fn print_status(view: &SessionView, prompt: Prompt) -> io::Result<()> {
    let mut out = io::stdout();

    if let Some(message) = &view.info_message {
        write!(out, "{}\r\n", message)?;
    }

    if view.is_loading {
        write!(out, "Scanning...\r\n")?;
    } else if let Some(failure) = view.scan_error {
        write!(out, "{}\r\n", failure.message())?;
    } else if view.show_paywall && prompt == Prompt::Paywall {
        write!(
            out,
            "Free limit of {} deletions reached. {} (p to buy, any key to close)\r\n",
            quota::FREE_DELETE_LIMIT,
            view.paywall_message.as_deref().unwrap_or("Unlock pro to keep deleting.")
        )?;
    } else {
        match &view.current_item {
            Some(item) => write!(
                out,
                "[{}] {}  {}  {}  ({} left)\r\n",
                view.active_filter,
                item.display_name,
                bytes_to_human_readable(item.size),
                date_to_short(&item.captured_at),
                view.remaining_count
            )?,
            None => write!(out, "[{}] Nothing left to review\r\n", view.active_filter)?,
        }
    }

    let free_left = match quota::remaining(&view.quota) {
        Some(left) => format!("{} free deletions left", left),
        None => "pro".to_string(),
    };
    write!(
        out,
        "  queued {} ({}) | kept {} | smart {} | {}\r\n",
        view.selected_count,
        bytes_to_human_readable(view.selected_bytes),
        view.kept_count,
        if view.smart_mode_enabled { "on" } else { "off" },
        free_left
    )?;
    out.flush()
}

fn print_help() -> io::Result<()> {
    let mut out = io::stdout();
    for line in [
        "k / Right   keep",
        "d / Left    queue for deletion",
        "u / Ctrl+Z  undo last swipe",
        "x           unqueue the last queued item",
        "D           delete queued batch",
        "r           rescan",
        "f           next filter",
        "s           toggle smart order",
        "c           toggle delete confirmation",
        "p / R       buy pro / restore purchases",
        "q / Esc     quit",
    ] {
        write!(out, "  {}\r\n", line)?;
    }
    out.flush()
}

fn print_line(line: &str) -> io::Result<()> {
    let mut out = io::stdout();
    write!(out, "{}\r\n", line)?;
    out.flush()
}
