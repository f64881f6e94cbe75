//! Command-line definitions for `answer-backup`.

use std::path::PathBuf;

use backup_core::DerivedConverterKind;
use backup_engine::BrowserSettings;
use clap::{Args, Parser, Subcommand};

use crate::config::ConfigPatch;

#[derive(Debug, Parser)]
#[command(name = "answer-backup")]
#[command(about = "Incrementally back up a profile's answers to local HTML and Markdown files")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Back up this profile; shorthand for `backup <USERNAME>`
    pub username: Option<String>,

    /// Also write the log to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Directory holding the per-user folders (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Log to the file only; needs --log-file
    #[arg(long, global = true, requires = "log_file")]
    pub quiet: bool,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Default, Args)]
pub struct BrowserArgs {
    /// Fetch pages over plain HTTP without a browser; the feed is read once
    #[arg(long, global = true)]
    pub static_html: bool,

    /// Chrome or Chromium binary to launch
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "static_html")]
    pub chrome: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true, conflicts_with = "static_html")]
    pub show_browser: bool,
}

impl BrowserArgs {
    pub fn settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: !self.show_browser,
            chrome_executable: self.chrome.clone(),
            ..BrowserSettings::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover new answers and save their content
    Backup(BackupArgs),

    /// Remove everything stored for a user
    Clean {
        /// Profile name; falls back to the configured username
        username: Option<String>,
    },

    /// Open the site root once to confirm pages can be loaded
    Check,
}

/// Per-run overrides. Anything left out comes from config files and the
/// environment.
#[derive(Debug, Default, Args)]
pub struct BackupArgs {
    /// Profile name, e.g. "jane doe" or "Jane-Doe"
    pub username: Option<String>,

    /// Number of new answers to collect
    #[arg(long, value_name = "N")]
    pub num_items: Option<usize>,

    /// Passes without new answers before giving up
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Settle delay after scrolling the feed
    #[arg(long, value_name = "MS")]
    pub scroll_timeout_ms: Option<u64>,

    /// Settle delay after clicking an answer title
    #[arg(long, value_name = "MS")]
    pub click_ms: Option<u64>,

    /// Print discovered and saved answers
    #[arg(long)]
    pub console: bool,

    /// Log each answer card's markup at debug level
    #[arg(long)]
    pub debug_html: bool,

    /// Only update answers.json, skip answer content
    #[arg(long)]
    pub index_only: bool,

    /// Presentation template file name
    #[arg(long, value_name = "FILE")]
    pub template: Option<String>,

    /// Line width for the cleaned HTML
    #[arg(long, value_name = "COLUMNS")]
    pub width: Option<usize>,

    /// Skip the cleaned HTML files
    #[arg(long)]
    pub no_html: bool,

    /// Skip the Markdown files
    #[arg(long)]
    pub no_markdown: bool,

    /// Leave answers with missing files alone
    #[arg(long)]
    pub no_retry_failed: bool,

    /// Markdown converter
    #[arg(long, value_parser = parse_converter, value_name = "builtin|html2md")]
    pub converter: Option<DerivedConverterKind>,
}

fn parse_converter(value: &str) -> Result<DerivedConverterKind, String> {
    value.parse().map_err(|err| format!("{err}"))
}

impl Cli {
    /// The subcommand to run, with a bare username meaning `backup`.
    pub fn take_command(&mut self) -> Option<Command> {
        self.command
            .take()
            .or_else(|| self.username.take().map(|name| Command::Backup(BackupArgs::for_username(name))))
    }
}

impl BackupArgs {
    pub fn for_username(username: String) -> Self {
        Self {
            username: Some(username),
            ..Self::default()
        }
    }

    /// Flags only ever switch a setting away from its default, so an absent
    /// flag leaves the lower layers alone.
    pub fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            username: self.username.clone(),
            num_items: self.num_items,
            max_retries: self.max_retries,
            scroll_settle_ms: self.scroll_timeout_ms,
            click_settle_ms: self.click_ms,
            console_output: self.console.then_some(true),
            debug_html: self.debug_html.then_some(true),
            include_content: self.index_only.then_some(false),
            template_filename: self.template.clone(),
            content_width: self.width,
            output_clean: self.no_html.then_some(false),
            output_derived: self.no_markdown.then_some(false),
            retry_failed: self.no_retry_failed.then_some(false),
            derived_converter: self.converter,
        }
    }
}
