//! Content materialization: raw capture, clean document and Markdown for every
//! item that is missing one of them.

use backup_core::{Item, ItemIndex, Representation, RepresentationSet, RunConfig};
use backup_logging::{backup_debug, backup_info, backup_warn};
use thiserror::Error;

use crate::clean::clean_markup;
use crate::content_store::ContentStore;
use crate::convert::{derive_markup, Converter};
use crate::index_store::{IndexError, IndexStore};
use crate::layout::ContentLayout;
use crate::persist::PersistError;
use crate::progress::{BackupEvent, ProgressSink, SkipReason};
use crate::surface::{AutomationSurface, SurfaceError, ViewId};
use crate::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeSettings {
    pub requested: RepresentationSet,
    pub retry_failed: bool,
    pub content_width: usize,
}

impl MaterializeSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            requested: config.representations(),
            retry_failed: config.retry_failed,
            content_width: config.content_width,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepresentationCounts {
    pub raw: usize,
    pub clean: usize,
    pub derived: usize,
}

impl RepresentationCounts {
    pub fn get(&self, representation: Representation) -> usize {
        match representation {
            Representation::Raw => self.raw,
            Representation::Clean => self.clean,
            Representation::Derived => self.derived,
        }
    }

    pub fn total(&self) -> usize {
        self.raw + self.clean + self.derived
    }

    fn bump(&mut self, representation: Representation) {
        match representation {
            Representation::Raw => self.raw += 1,
            Representation::Clean => self.clean += 1,
            Representation::Derived => self.derived += 1,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Items the selection rule picked.
    pub selected: usize,
    /// Answer pages opened.
    pub fetched: usize,
    /// Pages without usable content.
    pub skipped: usize,
    pub written: RepresentationCounts,
    pub failed: RepresentationCounts,
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to prepare content directories: {0}")]
    Directories(#[from] PersistError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

enum Capture {
    Markup(String),
    Skipped(SkipReason),
}

pub struct Materializer<'a, S: ?Sized> {
    surface: &'a S,
    layout: &'a ContentLayout,
    store: &'a ContentStore,
    index_store: &'a IndexStore,
    template: &'a Template,
    converter: &'a dyn Converter,
    settings: MaterializeSettings,
}

impl<'a, S> Materializer<'a, S>
where
    S: AutomationSurface + ?Sized,
{
    pub fn new(
        surface: &'a S,
        layout: &'a ContentLayout,
        store: &'a ContentStore,
        index_store: &'a IndexStore,
        template: &'a Template,
        converter: &'a dyn Converter,
        settings: MaterializeSettings,
    ) -> Self {
        Self {
            surface,
            layout,
            store,
            index_store,
            template,
            converter,
            settings,
        }
    }

    /// Process every selected item in index order. The index is persisted after
    /// each item whose recorded files changed.
    pub async fn run(
        &self,
        index: &mut ItemIndex,
        sink: &dyn ProgressSink,
    ) -> Result<MaterializeReport, MaterializeError> {
        self.store.ensure_dirs(self.settings.requested)?;
        let selected: Vec<usize> = index
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.needs_materialization(
                    self.settings.requested,
                    self.settings.retry_failed,
                    |relative| self.store.exists(relative),
                )
            })
            .map(|(position, _)| position)
            .collect();

        let mut report = MaterializeReport {
            selected: selected.len(),
            ..MaterializeReport::default()
        };
        backup_info!(
            "Saving content for {} item(s) to {}",
            selected.len(),
            self.store.root().display()
        );

        for position in selected {
            let Some(item) = index.get_mut(position) else {
                continue;
            };
            if self.materialize_item(item, &mut report, sink).await {
                self.index_store.persist(index)?;
            }
        }

        backup_info!(
            "Content done: {} written, {} failed, {} skipped",
            report.written.total(),
            report.failed.total(),
            report.skipped
        );
        Ok(report)
    }

    /// Returns whether the item's recorded files changed.
    async fn materialize_item(
        &self,
        item: &mut Item,
        report: &mut MaterializeReport,
        sink: &dyn ProgressSink,
    ) -> bool {
        let raw_present = self.store.is_present(item, Representation::Raw);
        let raw = if raw_present {
            match self.store.read_raw(item) {
                Ok(raw) => raw,
                Err(err) => {
                    backup_warn!("Failed to read raw content for {:?}: {}", item.question, err);
                    report.failed.bump(Representation::Raw);
                    return false;
                }
            }
        } else {
            report.fetched += 1;
            match self.fetch(&item.url).await {
                Ok(Capture::Markup(raw)) => raw,
                Ok(Capture::Skipped(reason)) => {
                    match reason {
                        SkipReason::ContainerMissing => {
                            backup_info!("Answer not found for URL: {}", item.url)
                        }
                        SkipReason::EmptyContainer => backup_info!(
                            "Content does not have child elements for URL: {}",
                            item.url
                        ),
                    }
                    report.skipped += 1;
                    sink.emit(BackupEvent::ContentSkipped {
                        question: item.question.clone(),
                        reason,
                    });
                    return false;
                }
                Err(err) => {
                    backup_warn!("Failed to extract content for URL: {}: {}", item.url, err);
                    report.failed.bump(Representation::Raw);
                    return false;
                }
            }
        };

        let missing: Vec<Representation> = self
            .settings
            .requested
            .iter()
            .filter(|representation| !self.store.is_present(item, *representation))
            .collect();
        let mut clean_cache: Option<String> = None;
        let mut saved = Vec::new();

        for representation in missing {
            let content = match representation {
                Representation::Raw => raw.clone(),
                Representation::Clean => {
                    self.cleaned(&mut clean_cache, &raw, &item.question).clone()
                }
                Representation::Derived => {
                    let cleaned = self.cleaned(&mut clean_cache, &raw, &item.question);
                    derive_markup(self.converter, cleaned)
                }
            };
            match self
                .store
                .write_verified(representation, &item.question, &content)
            {
                Ok(relative) => {
                    backup_debug!("Wrote {} for {:?} to {}", representation, item.question, relative);
                    item.record_path(representation, relative);
                    report.written.bump(representation);
                    saved.push(representation);
                }
                Err(err) => {
                    backup_warn!(
                        "Failed to write {} for {:?}: {}",
                        representation,
                        item.question,
                        err
                    );
                    report.failed.bump(representation);
                    if representation == Representation::Raw {
                        break;
                    }
                }
            }
        }

        if saved.is_empty() {
            return false;
        }
        sink.emit(BackupEvent::ContentSaved {
            question: item.question.clone(),
            representations: saved,
        });
        true
    }

    fn cleaned<'c>(&self, cache: &'c mut Option<String>, raw: &str, title: &str) -> &'c String {
        cache.get_or_insert_with(|| {
            clean_markup(raw, title, self.template, self.settings.content_width)
        })
    }

    /// Capture the content container's markup in a fresh view. The view is
    /// closed on every path.
    async fn fetch(&self, url: &str) -> Result<Capture, SurfaceError> {
        let view = self.surface.open_view().await?;
        let capture = self.capture(view, url).await;
        if let Err(err) = self.surface.close_view(view).await {
            backup_debug!("Failed to close view for {}: {}", url, err);
        }
        capture
    }

    async fn capture(&self, view: ViewId, url: &str) -> Result<Capture, SurfaceError> {
        self.surface.navigate(view, url).await?;
        let Some(container) = self.layout.locate_content(self.surface, view).await? else {
            return Ok(Capture::Skipped(SkipReason::ContainerMissing));
        };
        if !self
            .layout
            .has_child_elements(self.surface, container)
            .await?
        {
            return Ok(Capture::Skipped(SkipReason::EmptyContainer));
        }
        let markup = self.surface.read_inner_markup(container).await?;
        Ok(Capture::Markup(markup))
    }
}
