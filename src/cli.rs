// CLI module for argument parsing and configuration

use crate::filters::FilterPreset;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Swipe Cleaner - review photos and videos one at a time
///
/// Keep what you love, queue the rest for deletion, then delete the batch.
#[derive(Parser, Debug, Clone)]
#[command(name = "swipe-cleaner")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media directory to scan
    ///
    /// If not specified, defaults to the current directory.
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    /// Start with this filter preset instead of the saved one
    #[arg(short = 'f', long = "filter", value_enum)]
    pub filter: Option<FilterArg>,

    /// Order the queue by cleanup value
    #[arg(long = "smart", action = ArgAction::SetTrue, conflicts_with = "no_smart")]
    pub smart: bool,

    /// Keep the queue in newest-first order
    #[arg(long = "no-smart", action = ArgAction::SetTrue)]
    pub no_smart: bool,

    /// Dry run mode - report deletions without moving files to trash
    #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Delete batches without asking first
    #[arg(long = "no-confirm", action = ArgAction::SetTrue)]
    pub no_confirm: bool,

    /// Require a second approval step from the catalog before trashing
    #[arg(long = "platform-confirm", action = ArgAction::SetTrue)]
    pub platform_confirm: bool,

    /// Include hidden files and directories (names starting with .)
    #[arg(long = "hidden", action = ArgAction::SetTrue)]
    pub show_hidden: bool,

    /// Preferences file to use instead of the default location
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Report the pro unlock as owned (development builds without a store)
    #[arg(long = "pro", action = ArgAction::SetTrue)]
    pub pro: bool,
}

/// Filter preset options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    /// Everything
    All,
    /// Files of 50 MB or more
    Large,
    /// Captured more than six months ago
    Old,
    /// Screenshots
    Screenshots,
    /// WhatsApp media folders
    Whatsapp,
    /// Videos only
    Videos,
}

impl From<FilterArg> for FilterPreset {
    fn from(filter: FilterArg) -> Self {
        match filter {
            FilterArg::All => FilterPreset::All,
            FilterArg::Large => FilterPreset::LargeOnly,
            FilterArg::Old => FilterPreset::OldOnly,
            FilterArg::Screenshots => FilterPreset::Screenshots,
            FilterArg::Whatsapp => FilterPreset::WhatsappMedia,
            FilterArg::Videos => FilterPreset::Videos,
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Smart-mode override, if either flag was given
    pub fn smart_mode(&self) -> Option<bool> {
        match (self.smart, self.no_smart) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Validate the arguments and return any errors
    pub fn validate(&self) -> Result<(), String> {
        if !self.directory.exists() {
            return Err(format!(
                "Directory does not exist: {}",
                self.directory.display()
            ));
        }

        if !self.directory.is_dir() {
            return Err(format!(
                "Path is not a directory: {}",
                self.directory.display()
            ));
        }

        if let Some(ref config) = self.config {
            if config.is_dir() {
                return Err(format!(
                    "Config path is a directory: {}",
                    config.display()
                ));
            }
        }

        Ok(())
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub directory: PathBuf,
    pub filter: Option<FilterPreset>,
    pub smart_mode: Option<bool>,
    pub dry_run: bool,
    /// `Some(false)` when `--no-confirm` was given
    pub require_confirmation: Option<bool>,
    pub platform_confirm: bool,
    pub show_hidden: bool,
    pub config_path: Option<PathBuf>,
    pub pro: bool,
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        AppConfig {
            filter: args.filter.map(FilterPreset::from),
            smart_mode: args.smart_mode(),
            require_confirmation: if args.no_confirm { Some(false) } else { None },
            directory: args.directory,
            dry_run: args.dry_run,
            platform_confirm: args.platform_confirm,
            show_hidden: args.show_hidden,
            config_path: args.config,
            pro: args.pro,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            directory: PathBuf::from("."),
            filter: None,
            smart_mode: None,
            dry_run: false,
            require_confirmation: None,
            platform_confirm: false,
            show_hidden: false,
            config_path: None,
            pro: false,
        }
    }
}
