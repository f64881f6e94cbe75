mod cli;
mod config;
mod console;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use backup_core::RunConfig;
use backup_engine::{
    check_surface, clean_subject, run_backup, AutomationSurface, BackupContext, BackupSummary,
    ChromiumSurface, FeedLayout, FetchSettings, ReqwestPageSource, StaticHtmlSurface,
};
use backup_logging::{backup_debug, backup_error, backup_info, backup_warn, LogDestination};
use clap::Parser;
use log::LevelFilter;

use cli::{BackupArgs, BrowserArgs, Cli, Command};
use config::ConfigPatch;
use console::ConsoleSink;

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let dirs = config::config_dirs();
    let lookup = |key: &str| env::var(key).ok();

    let command = match cli.take_command() {
        Some(command) => command,
        None => {
            let configured = config::resolve(&dirs, lookup, ConfigPatch::default())?;
            if configured.username.is_empty() {
                Command::Check
            } else {
                Command::Backup(BackupArgs::for_username(configured.username))
            }
        }
    };

    let patch = match &command {
        Command::Backup(args) => args.to_patch(),
        Command::Clean { username } => ConfigPatch {
            username: username.clone(),
            ..ConfigPatch::default()
        },
        Command::Check => ConfigPatch::default(),
    };
    let config = config::resolve(&dirs, lookup, patch)?;
    init_logging(cli.log_file, cli.quiet, &config);
    backup_debug!("Resolved configuration: {:?}", config);

    let output_root = match cli.output_dir {
        Some(dir) => dir,
        None => env::current_dir().context("cannot determine the current directory")?,
    };

    let outcome = match command {
        Command::Backup(_) => backup(&config, &cli.browser, output_root),
        Command::Clean { .. } => clean(&config, output_root),
        Command::Check => check(&cli.browser),
    };
    if let Err(err) = &outcome {
        backup_error!("{:#}", err);
    }
    outcome
}

fn init_logging(log_file: Option<PathBuf>, quiet: bool, config: &RunConfig) {
    let level = if config.debug_html {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match log_file {
        Some(path) if quiet => LogDestination::File(path),
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    backup_logging::initialize(destination, level);
}

/// The page surface a command drives.
enum Surface {
    Static(StaticHtmlSurface<ReqwestPageSource>),
    Browser(ChromiumSurface),
}

impl Surface {
    async fn open(browser: &BrowserArgs) -> Result<Self> {
        if browser.static_html {
            let source = ReqwestPageSource::new(FetchSettings::default());
            return Ok(Self::Static(StaticHtmlSurface::new(source)));
        }
        let surface = ChromiumSurface::launch(browser.settings())
            .await
            .context("cannot start the browser; pass --chrome <PATH> or --static-html")?;
        Ok(Self::Browser(surface))
    }

    fn get(&self) -> &dyn AutomationSurface {
        match self {
            Self::Static(surface) => surface,
            Self::Browser(surface) => surface,
        }
    }

    async fn close(self) {
        if let Self::Browser(surface) = self {
            if let Err(err) = surface.shutdown().await {
                backup_warn!("Browser shutdown failed: {}", err);
            }
        }
    }
}

fn backup(config: &RunConfig, browser: &BrowserArgs, output_root: PathBuf) -> Result<()> {
    config::require_username(config)?;
    let runtime = tokio::runtime::Runtime::new().context("cannot start the async runtime")?;
    let ctx = BackupContext::new(output_root);
    let sink = ConsoleSink::new(config.console_output);

    let summary = runtime
        .block_on(async {
            let surface = Surface::open(browser).await?;
            let outcome = run_backup(surface.get(), config, &ctx, &sink).await;
            surface.close().await;
            outcome.map_err(anyhow::Error::from)
        })
        .with_context(|| format!("backup for {} failed", config.username))?;
    report(&summary);
    Ok(())
}

fn report(summary: &BackupSummary) {
    backup_info!(
        "{}: {} ({} new, {} checked, {} pass(es)); index holds {} answer(s)",
        summary.subject,
        summary.extraction.termination,
        summary.merged,
        summary.extraction.checked_items,
        summary.extraction.passes,
        summary.total_items
    );
    if let Some(content) = &summary.content {
        backup_info!(
            "Content: {} selected, {} fetched, {} skipped; written raw/clean/derived {}/{}/{}, failed {}/{}/{}",
            content.selected,
            content.fetched,
            content.skipped,
            content.written.raw,
            content.written.clean,
            content.written.derived,
            content.failed.raw,
            content.failed.clean,
            content.failed.derived
        );
    }
}

fn clean(config: &RunConfig, output_root: PathBuf) -> Result<()> {
    let username = config::require_username(config)?;
    let removed = clean_subject(&output_root, username)
        .with_context(|| format!("cannot remove stored data for {username}"))?;
    if !removed {
        backup_info!("Nothing stored for {} under {:?}", username, output_root);
    }
    Ok(())
}

fn check(browser: &BrowserArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("cannot start the async runtime")?;
    let feed = FeedLayout::default();
    runtime
        .block_on(async {
            let surface = Surface::open(browser).await?;
            let outcome = check_surface(surface.get(), &feed).await;
            surface.close().await;
            outcome.map_err(anyhow::Error::from)
        })
        .with_context(|| format!("cannot load {}", feed.base_url))?;
    println!("Loaded {} successfully.", feed.base_url);
    Ok(())
}
