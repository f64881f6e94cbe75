#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backup_engine::{
    AutomationSurface, BackupEvent, ElementHandle, FeedLayout, LoadedPage, Locator, PageSource,
    ProgressSink, Scope, SurfaceError, SurfaceFailure, ViewId, SCROLL_HEIGHT_EXPR,
    SCROLL_TO_BOTTOM_EXPR,
};
use serde_json::Value;

const FEED_VIEW: ViewId = ViewId(0);
const CONTENT_SELECTOR: &str = "span.qu-userSelect--text";

const TITLE: u64 = 0;
const CONTAINER: u64 = 1;
const LINK: u64 = 2;
const TIMESTAMP: u64 = 3;

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub href: Option<String>,
    pub date: Option<String>,
}

impl FeedEntry {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            href: Some(format!("/{}", title.replace(' ', "-"))),
            date: None,
        }
    }

    pub fn dated(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn without_link(mut self) -> Self {
        self.href = None;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    visible: usize,
    scrolls: usize,
    clicks: usize,
    waits: Vec<Duration>,
    navigations: Vec<(ViewId, String)>,
    next_view: u64,
    open_views: Vec<ViewId>,
    closed_views: Vec<ViewId>,
    view_urls: HashMap<ViewId, String>,
}

/// Scripted feed plus answer pages. `batch` entries render per scroll; when
/// `endless` is set the extent keeps growing even after every entry shows.
pub struct FakeFeedSurface {
    layout: FeedLayout,
    entries: Vec<FeedEntry>,
    batch: usize,
    endless: bool,
    pages: HashMap<String, Option<String>>,
    state: Mutex<FakeState>,
}

impl FakeFeedSurface {
    pub fn new(entries: Vec<FeedEntry>, batch: usize) -> Self {
        Self {
            layout: FeedLayout::default(),
            state: Mutex::new(FakeState {
                visible: batch.min(entries.len()),
                next_view: 1,
                ..FakeState::default()
            }),
            entries,
            batch,
            endless: false,
            pages: HashMap::new(),
        }
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Register an answer page. `None` renders a page without the content container.
    pub fn with_page(mut self, url: &str, content: Option<&str>) -> Self {
        self.pages
            .insert(url.to_string(), content.map(str::to_string));
        self
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.state.lock().unwrap().waits.clone()
    }

    /// URLs loaded into views other than the feed.
    pub fn page_loads(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .navigations
            .iter()
            .filter(|(view, _)| *view != FEED_VIEW)
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn feed_loads(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .navigations
            .iter()
            .filter(|(view, _)| *view == FEED_VIEW)
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub fn opened_and_closed(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.open_views.len(), state.closed_views.len())
    }

    fn feed_handle(index: usize, kind: u64) -> ElementHandle {
        ElementHandle {
            view: FEED_VIEW,
            node: ((index as u64) << 2) | kind,
        }
    }

    fn entry(&self, element: ElementHandle) -> Result<(&FeedEntry, u64), SurfaceError> {
        let index = (element.node >> 2) as usize;
        self.entries
            .get(index)
            .map(|entry| (entry, element.node & 3))
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::StaleElement, "no such entry"))
    }

    fn page_content(&self, view: ViewId) -> Option<Option<String>> {
        let state = self.state.lock().unwrap();
        let url = state.view_urls.get(&view)?;
        self.pages.get(url).cloned()
    }
}

#[async_trait::async_trait]
impl AutomationSurface for FakeFeedSurface {
    fn primary_view(&self) -> ViewId {
        FEED_VIEW
    }

    async fn navigate(&self, view: ViewId, url: &str) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push((view, url.to_string()));
        if view != FEED_VIEW && !self.pages.contains_key(url) {
            return Err(SurfaceError::new(SurfaceFailure::HttpStatus(404), url));
        }
        state.view_urls.insert(view, url.to_string());
        Ok(())
    }

    async fn query_all(
        &self,
        view: ViewId,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, SurfaceError> {
        if view == FEED_VIEW && selector == self.layout.title_selector {
            let visible = self.state.lock().unwrap().visible;
            return Ok((0..visible)
                .map(|index| Self::feed_handle(index, TITLE))
                .collect());
        }
        if view == FEED_VIEW {
            let visible = self.state.lock().unwrap().visible;
            let matched: Vec<_> = self.entries[..visible]
                .iter()
                .enumerate()
                .filter(|(_, entry)| selector == self.layout.title_match_selector(&entry.title))
                .map(|(index, _)| Self::feed_handle(index, TITLE))
                .collect();
            if !matched.is_empty() {
                return Ok(matched);
            }
        }
        if selector == CONTENT_SELECTOR {
            return Ok(match self.page_content(view) {
                Some(Some(_)) => vec![
                    ElementHandle { view, node: 0 },
                    ElementHandle { view, node: 1 },
                ],
                Some(None) => vec![ElementHandle { view, node: 0 }],
                None => Vec::new(),
            });
        }
        Ok(Vec::new())
    }

    async fn query_one(
        &self,
        scope: Scope,
        locator: Locator<'_>,
    ) -> Result<Option<ElementHandle>, SurfaceError> {
        match (scope, locator) {
            (Scope::Element(element), Locator::Ancestor(levels)) if element.view == FEED_VIEW => {
                let (_, kind) = self.entry(element)?;
                if kind == TITLE && levels == self.layout.container_levels {
                    Ok(Some(Self::feed_handle((element.node >> 2) as usize, CONTAINER)))
                } else {
                    Ok(None)
                }
            }
            (Scope::Element(element), Locator::Css(selector)) if element.view == FEED_VIEW => {
                let (entry, kind) = self.entry(element)?;
                let index = (element.node >> 2) as usize;
                if kind != CONTAINER {
                    return Ok(None);
                }
                if selector == self.layout.link_selector {
                    Ok(Some(Self::feed_handle(index, LINK)))
                } else if selector == self.layout.timestamp_selector && entry.date.is_some() {
                    Ok(Some(Self::feed_handle(index, TIMESTAMP)))
                } else {
                    Ok(None)
                }
            }
            (Scope::Element(element), Locator::Css("*")) => {
                let content = self.page_content(element.view).flatten();
                Ok(content
                    .filter(|markup| element.node == 1 && markup.contains('<'))
                    .map(|_| ElementHandle {
                        view: element.view,
                        node: 2,
                    }))
            }
            _ => Ok(None),
        }
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        let (entry, kind) = self.entry(element)?;
        match kind {
            TITLE => Ok(entry.title.clone()),
            TIMESTAMP => Ok(entry.date.clone().unwrap_or_default()),
            _ => Ok(String::new()),
        }
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SurfaceError> {
        let (entry, kind) = self.entry(element)?;
        Ok(if kind == LINK && name == "href" {
            entry.href.clone()
        } else {
            None
        })
    }

    async fn read_inner_markup(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        if element.view == FEED_VIEW {
            let (entry, _) = self.entry(element)?;
            return Ok(format!("<div>{}</div>", entry.title));
        }
        Ok(self.page_content(element.view).flatten().unwrap_or_default())
    }

    async fn click(&self, _element: ElementHandle) -> Result<(), SurfaceError> {
        self.state.lock().unwrap().clicks += 1;
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        self.state.lock().unwrap().waits.push(duration);
    }

    async fn evaluate(&self, view: ViewId, expression: &str) -> Result<Value, SurfaceError> {
        let mut state = self.state.lock().unwrap();
        match expression {
            SCROLL_HEIGHT_EXPR if view == FEED_VIEW => {
                let height = state.visible * 100 + state.scrolls * usize::from(self.endless);
                Ok(Value::from(height as u64))
            }
            SCROLL_TO_BOTTOM_EXPR if view == FEED_VIEW => {
                state.scrolls += 1;
                state.visible = (state.visible + self.batch).min(self.entries.len());
                Ok(Value::Null)
            }
            other => Err(SurfaceError::new(SurfaceFailure::UnsupportedExpression, other)),
        }
    }

    async fn open_view(&self) -> Result<ViewId, SurfaceError> {
        let mut state = self.state.lock().unwrap();
        let view = ViewId(state.next_view);
        state.next_view += 1;
        state.open_views.push(view);
        Ok(view)
    }

    async fn close_view(&self, view: ViewId) -> Result<(), SurfaceError> {
        self.state.lock().unwrap().closed_views.push(view);
        Ok(())
    }
}

/// Page source serving fixed documents; unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryPageSource {
    pages: HashMap<String, String>,
    loads: Mutex<Vec<String>>,
}

impl MemoryPageSource {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageSource for MemoryPageSource {
    async fn load(&self, url: &str) -> Result<LoadedPage, SurfaceError> {
        self.loads.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .map(|html| LoadedPage {
                final_url: url.to_string(),
                html: html.clone(),
            })
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::HttpStatus(404), url))
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<BackupEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<BackupEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: BackupEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub const TEMPLATE: &str = "<!DOCTYPE html><html><head><title>{{title}}</title></head><body>{{content}}</body></html>";

pub fn init_logging() {
    backup_logging::initialize_for_tests();
}
