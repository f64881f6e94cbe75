use std::sync::Arc;
use std::time::Duration;

use backup_core::{
    format_timestamp, parse_posted_date, ExtractionState, Item, ItemIndex, RunConfig, Termination,
};
use backup_logging::{backup_debug, backup_info, backup_warn};
use chrono::{DateTime, Utc};

use crate::layout::FeedLayout;
use crate::progress::{BackupEvent, ProgressSink};
use crate::surface::{
    AutomationSurface, ElementHandle, SurfaceError, SurfaceFailure, ViewId, SCROLL_HEIGHT_EXPR,
    SCROLL_TO_BOTTOM_EXPR,
};

/// Source of "now" for resolving relative dates.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct ExtractSettings {
    pub target: usize,
    pub max_retries: u32,
    pub scroll_settle: Duration,
    pub click_settle: Duration,
    /// Log each answer card's markup at debug level.
    pub debug_markup: bool,
    pub clock: Clock,
}

impl ExtractSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            target: config.num_items,
            max_retries: config.max_retries,
            scroll_settle: config.scroll_settle(),
            click_settle: config.click_settle(),
            debug_markup: config.debug_html,
            clock: Arc::new(Utc::now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Newly found items in discovery order; none of them is in the index.
    pub discovered: Vec<Item>,
    pub termination: Termination,
    pub new_items: usize,
    pub checked_items: usize,
    pub retries: u32,
    pub passes: usize,
}

/// Why a single title could not be turned into an item.
#[derive(Debug, thiserror::Error)]
pub enum ItemExtractError {
    #[error("title text is empty")]
    EmptyTitle,
    #[error("title element not found after click")]
    TitleNotFound,
    #[error("answer card not found above the title")]
    ContainerNotFound,
    #[error("question link not found in the answer card")]
    LinkNotFound,
    #[error("question link has no href")]
    MissingHref,
    #[error("invalid question link {href:?}: {source}")]
    InvalidUrl {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Walks the subject's feed in the surface's primary view, which must already
/// show the feed.
pub struct FeedExtractor<'a, S: ?Sized> {
    surface: &'a S,
    layout: &'a FeedLayout,
    settings: ExtractSettings,
}

impl<'a, S> FeedExtractor<'a, S>
where
    S: AutomationSurface + ?Sized,
{
    pub fn new(surface: &'a S, layout: &'a FeedLayout, settings: ExtractSettings) -> Self {
        Self {
            surface,
            layout,
            settings,
        }
    }

    /// Collect up to `target` items whose questions are not in `index`.
    ///
    /// Failures for a single title are logged and skipped. Failing to list
    /// titles or to scroll aborts the walk.
    pub async fn run(
        &self,
        subject: &str,
        index: &ItemIndex,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionOutcome, SurfaceError> {
        let view = self.surface.primary_view();
        let mut state = ExtractionState::new(
            self.settings.target,
            self.settings.max_retries,
            index.questions(),
        );
        let mut discovered = Vec::new();
        let mut passes = 0;

        while state.should_continue() {
            passes += 1;
            let mark = state.begin_pass();
            let titles = self.layout.locate_titles(self.surface, view).await?;

            for handle in titles {
                if state.target_reached() {
                    break;
                }
                let title = match self.surface.read_text(handle).await {
                    Ok(title) => title,
                    Err(err) => {
                        backup_warn!("Failed to read a title element: {}", err);
                        continue;
                    }
                };
                if state.is_known(&title) {
                    state.record_known();
                    continue;
                }
                match self.extract_item(view, handle, &title, subject).await {
                    Ok(item) => {
                        if state.record_new(item.question.clone()) {
                            backup_debug!("Title: {} URL: {}", item.question, item.url);
                            sink.emit(BackupEvent::ItemDiscovered {
                                question: item.question.clone(),
                                url: item.url.clone(),
                            });
                            discovered.push(item);
                        }
                    }
                    Err(err) => {
                        backup_warn!("Failed to extract URL for title {:?}: {}", title, err);
                    }
                }
            }

            backup_info!("Collected {} new unique titles so far.", state.new_items());
            sink.emit(BackupEvent::PassCompleted {
                new_items: state.new_items(),
                retries: state.retries(),
            });

            if state.target_reached() {
                break;
            }

            let before = self.scroll_extent(view).await?;
            self.surface.evaluate(view, SCROLL_TO_BOTTOM_EXPR).await?;
            self.surface.wait(self.settings.scroll_settle).await;
            let after = self.scroll_extent(view).await?;

            if state.record_scroll(mark, before, after).is_some() {
                break;
            }
        }

        let termination = state.termination();
        match termination {
            Termination::TargetReached => {
                backup_info!("Successfully collected the required number of new items.")
            }
            Termination::ExhaustedFeed => backup_info!("No more content to load."),
            Termination::MaxRetriesExceeded => {
                backup_info!("Exited due to exceeding the maximum number of retries.")
            }
        }
        sink.emit(BackupEvent::ExtractionFinished {
            termination,
            new_items: state.new_items(),
        });

        Ok(ExtractionOutcome {
            discovered,
            termination,
            new_items: state.new_items(),
            checked_items: state.checked_items(),
            retries: state.retries(),
            passes,
        })
    }

    async fn extract_item(
        &self,
        view: ViewId,
        handle: ElementHandle,
        title: &str,
        subject: &str,
    ) -> Result<Item, ItemExtractError> {
        if title.trim().is_empty() {
            return Err(ItemExtractError::EmptyTitle);
        }
        self.surface.click(handle).await?;
        self.surface.wait(self.settings.click_settle).await;

        let title_element = self
            .layout
            .relocate_title(self.surface, view, title)
            .await?
            .ok_or(ItemExtractError::TitleNotFound)?;
        let container = self
            .layout
            .locate_item_container(self.surface, title_element)
            .await?
            .ok_or(ItemExtractError::ContainerNotFound)?;

        if self.settings.debug_markup {
            let markup = self.surface.read_inner_markup(container).await?;
            backup_debug!("Debug HTML for title: {}\n{}", title, markup);
        }

        let link = self
            .layout
            .locate_question_link(self.surface, container)
            .await?
            .ok_or(ItemExtractError::LinkNotFound)?;
        let href = self
            .surface
            .read_attribute(link, "href")
            .await?
            .ok_or(ItemExtractError::MissingHref)?;
        let url = self
            .layout
            .answer_url(&href, subject)
            .map_err(|source| ItemExtractError::InvalidUrl { href, source })?;

        let date_posted = self.posted_date(container).await;
        Ok(Item::new(title, url).with_date_posted(date_posted))
    }

    /// Missing or unparseable dates leave the field empty.
    async fn posted_date(&self, container: ElementHandle) -> Option<String> {
        let link = match self
            .layout
            .locate_timestamp_link(self.surface, container)
            .await
        {
            Ok(link) => link?,
            Err(err) => {
                backup_debug!("Timestamp lookup failed: {}", err);
                return None;
            }
        };
        let text = self.surface.read_text(link).await.ok()?;
        let parsed = parse_posted_date(&text, (self.settings.clock)());
        if parsed.is_none() {
            backup_debug!("Unrecognized date text {:?}", text);
        }
        parsed.map(format_timestamp)
    }

    async fn scroll_extent(&self, view: ViewId) -> Result<u64, SurfaceError> {
        let value = self.surface.evaluate(view, SCROLL_HEIGHT_EXPR).await?;
        value
            .as_f64()
            .filter(|height| height.is_finite() && *height >= 0.0)
            .map(|height| height.round() as u64)
            .ok_or_else(|| {
                SurfaceError::new(
                    SurfaceFailure::UnsupportedExpression,
                    format!("scroll height is not a number: {value}"),
                )
            })
    }
}
