//! One backup run for one subject, from index load to content report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backup_core::{ConfigError, RunConfig};
use backup_logging::backup_info;
use thiserror::Error;

use crate::content_store::ContentStore;
use crate::convert::converter_for;
use crate::extractor::{ExtractSettings, ExtractionOutcome, FeedExtractor};
use crate::index_store::{IndexError, IndexStore};
use crate::layout::{ContentLayout, FeedLayout};
use crate::materialize::{MaterializeError, MaterializeReport, MaterializeSettings, Materializer};
use crate::progress::ProgressSink;
use crate::surface::{AutomationSurface, SurfaceError};
use crate::template::{default_search_dirs, load_template, TemplateError};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("feed unavailable: {0}")]
    Surface(#[from] SurfaceError),
    #[error("cannot build profile url: {0}")]
    ProfileUrl(#[source] url::ParseError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Where a run reads and writes, and how it reads the site.
#[derive(Debug, Clone)]
pub struct BackupContext {
    /// Parent of the per-subject directories.
    pub output_root: PathBuf,
    pub template_dirs: Vec<PathBuf>,
    pub feed: FeedLayout,
    pub content: ContentLayout,
}

impl BackupContext {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            template_dirs: default_search_dirs(),
            feed: FeedLayout::default(),
            content: ContentLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub subject: String,
    pub extraction: ExtractionOutcome,
    /// Items appended to the index this run.
    pub merged: usize,
    pub total_items: usize,
    /// `None` when content was not requested.
    pub content: Option<MaterializeReport>,
}

/// Run extraction and, when requested, materialization for `config.username`.
///
/// A corrupt index, a missing template, or an unreachable feed abort the run
/// before anything is written.
pub async fn run_backup<S>(
    surface: &S,
    config: &RunConfig,
    ctx: &BackupContext,
    sink: &dyn ProgressSink,
) -> Result<BackupSummary, BackupError>
where
    S: AutomationSurface + ?Sized,
{
    config.validate()?;
    let subject = config.username.as_str();
    let index_store = IndexStore::for_subject(&ctx.output_root, subject);
    let mut index = index_store.load()?;
    backup_info!(
        "Loaded {} known item(s) from {}",
        index.len(),
        index_store.path().display()
    );

    let template = if config.include_content {
        Some(load_template(&config.template_filename, &ctx.template_dirs)?)
    } else {
        None
    };

    let profile = ctx.feed.profile_url(subject).map_err(BackupError::ProfileUrl)?;
    backup_info!("Opening {}", profile);
    surface.navigate(surface.primary_view(), profile.as_str()).await?;

    let extractor = FeedExtractor::new(surface, &ctx.feed, ExtractSettings::from_config(config));
    let extraction = extractor.run(subject, &index, sink).await?;

    let merged = index.merge(extraction.discovered.iter().cloned());
    if merged > 0 {
        index_store.persist(&index)?;
        backup_info!(
            "Saved {} new item(s) to {}",
            merged,
            index_store.path().display()
        );
    } else {
        backup_info!("No new items found.");
    }

    let content = match template {
        Some(template) => {
            let store = ContentStore::for_subject(&ctx.output_root, subject);
            let converter = converter_for(config.derived_converter);
            let materializer = Materializer::new(
                surface,
                &ctx.content,
                &store,
                &index_store,
                &template,
                converter.as_ref(),
                MaterializeSettings::from_config(config),
            );
            Some(materializer.run(&mut index, sink).await?)
        }
        None => None,
    };

    Ok(BackupSummary {
        subject: subject.to_string(),
        extraction,
        merged,
        total_items: index.len(),
        content,
    })
}

/// Delete everything stored for `subject`. Returns whether anything existed.
pub fn clean_subject(output_root: &Path, subject: &str) -> io::Result<bool> {
    let dir = output_root.join(subject);
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            backup_info!("{} directory removed.", dir.display());
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Open the site root in a scratch view and close it again.
pub async fn check_surface<S>(surface: &S, feed: &FeedLayout) -> Result<(), SurfaceError>
where
    S: AutomationSurface + ?Sized,
{
    let view = surface.open_view().await?;
    let loaded = surface.navigate(view, feed.base_url.as_str()).await;
    surface.close_view(view).await?;
    loaded
}
