//! An [`AutomationSurface`] over server-rendered HTML.
//!
//! Each view holds the markup of the last page navigated to. Queries run
//! against a fresh parse of that markup, so element handles are positions in
//! document order and stay valid until the view navigates again. Clicking does
//! nothing and the scroll extent never grows, so a feed walked through this
//! surface ends after its first pass with [`Termination::ExhaustedFeed`].
//!
//! [`Termination::ExhaustedFeed`]: backup_core::Termination::ExhaustedFeed

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::fetch::PageSource;
use crate::surface::{
    AutomationSurface, ElementHandle, Locator, Scope, SurfaceError, SurfaceFailure, ViewId,
    SCROLL_HEIGHT_EXPR, SCROLL_TO_BOTTOM_EXPR,
};
use crate::text_query::{normalize_text, TextQuery};

const PRIMARY_VIEW: ViewId = ViewId(0);

#[derive(Debug, Default)]
struct ViewState {
    url: Option<String>,
    markup: Option<Arc<str>>,
}

pub struct StaticHtmlSurface<P> {
    source: P,
    views: Mutex<HashMap<ViewId, ViewState>>,
    next_view: AtomicU64,
}

impl<P: PageSource> StaticHtmlSurface<P> {
    pub fn new(source: P) -> Self {
        let mut views = HashMap::new();
        views.insert(PRIMARY_VIEW, ViewState::default());
        Self {
            source,
            views: Mutex::new(views),
            next_view: AtomicU64::new(PRIMARY_VIEW.0 + 1),
        }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    /// URL of the page currently loaded in `view`, after redirects.
    pub fn current_url(&self, view: ViewId) -> Option<String> {
        self.views().get(&view).and_then(|state| state.url.clone())
    }

    /// Number of views currently open, the primary view included.
    pub fn open_views(&self) -> usize {
        self.views().len()
    }

    fn views(&self) -> MutexGuard<'_, HashMap<ViewId, ViewState>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn markup(&self, view: ViewId) -> Result<Arc<str>, SurfaceError> {
        let views = self.views();
        let state = views
            .get(&view)
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::UnknownView(view), "view is closed"))?;
        state
            .markup
            .clone()
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::NotLoaded, "navigate first"))
    }

    fn with_document<R>(
        &self,
        view: ViewId,
        f: impl FnOnce(&Html) -> Result<R, SurfaceError>,
    ) -> Result<R, SurfaceError> {
        let markup = self.markup(view)?;
        let document = Html::parse_document(&markup);
        f(&document)
    }

    fn with_element<R>(
        &self,
        element: ElementHandle,
        f: impl FnOnce(ElementRef<'_>) -> R,
    ) -> Result<R, SurfaceError> {
        self.with_document(element.view, |document| {
            element_at(document, element.node).map(f)
        })
    }
}

#[async_trait::async_trait]
impl<P: PageSource> AutomationSurface for StaticHtmlSurface<P> {
    fn primary_view(&self) -> ViewId {
        PRIMARY_VIEW
    }

    async fn navigate(&self, view: ViewId, url: &str) -> Result<(), SurfaceError> {
        if !self.views().contains_key(&view) {
            return Err(SurfaceError::new(SurfaceFailure::UnknownView(view), url));
        }
        let page = self.source.load(url).await?;
        let mut views = self.views();
        let state = views
            .get_mut(&view)
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::UnknownView(view), url))?;
        state.url = Some(page.final_url);
        state.markup = Some(Arc::from(page.html));
        Ok(())
    }

    async fn query_all(
        &self,
        view: ViewId,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, SurfaceError> {
        let query = CompiledQuery::parse(selector)?;
        self.with_document(view, |document| {
            let matched: HashSet<_> = document
                .select(&query.css)
                .filter(|element| query.accepts(*element))
                .map(|element| element.id())
                .collect();
            Ok(elements(document)
                .enumerate()
                .filter(|(_, element)| matched.contains(&element.id()))
                .map(|(node, _)| ElementHandle {
                    view,
                    node: node as u64,
                })
                .collect())
        })
    }

    async fn query_one(
        &self,
        scope: Scope,
        locator: Locator<'_>,
    ) -> Result<Option<ElementHandle>, SurfaceError> {
        let view = match scope {
            Scope::View(view) => view,
            Scope::Element(element) => element.view,
        };
        self.with_document(view, |document| {
            let found = match (scope, locator) {
                (Scope::View(_), Locator::Css(selector)) => {
                    let query = CompiledQuery::parse(selector)?;
                    document
                        .select(&query.css)
                        .find(|element| query.accepts(*element))
                }
                (Scope::View(_), Locator::Ancestor(_)) => None,
                (Scope::Element(handle), Locator::Css(selector)) => {
                    let query = CompiledQuery::parse(selector)?;
                    let base = element_at(document, handle.node)?;
                    base.select(&query.css)
                        .filter(|element| element.id() != base.id())
                        .find(|element| query.accepts(*element))
                }
                (Scope::Element(handle), Locator::Ancestor(levels)) => {
                    let mut current = element_at(document, handle.node)?;
                    let mut found = Some(current);
                    for _ in 0..levels {
                        found = current.parent().and_then(ElementRef::wrap);
                        match found {
                            Some(parent) => current = parent,
                            None => break,
                        }
                    }
                    found
                }
            };
            Ok(found.map(|element| ElementHandle {
                view,
                node: node_index(document, element),
            }))
        })
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        self.with_element(element, |el| normalize_text(&el.text().collect::<String>()))
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SurfaceError> {
        self.with_element(element, |el| el.value().attr(name).map(str::to_owned))
    }

    async fn read_inner_markup(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        self.with_element(element, |el| el.inner_html())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), SurfaceError> {
        self.with_element(element, |_| ())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn evaluate(&self, view: ViewId, expression: &str) -> Result<Value, SurfaceError> {
        let markup = self.markup(view)?;
        match expression.trim() {
            SCROLL_HEIGHT_EXPR => Ok(Value::from(markup.len() as u64)),
            SCROLL_TO_BOTTOM_EXPR => Ok(Value::Null),
            other => Err(SurfaceError::new(SurfaceFailure::UnsupportedExpression, other)),
        }
    }

    async fn open_view(&self) -> Result<ViewId, SurfaceError> {
        let view = ViewId(self.next_view.fetch_add(1, Ordering::Relaxed));
        self.views().insert(view, ViewState::default());
        Ok(view)
    }

    async fn close_view(&self, view: ViewId) -> Result<(), SurfaceError> {
        if view == PRIMARY_VIEW {
            return Ok(());
        }
        self.views()
            .remove(&view)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::UnknownView(view), "already closed"))
    }
}

/// A [`TextQuery`] with its CSS part compiled for scraper.
struct CompiledQuery {
    css: Selector,
    query: TextQuery,
}

impl CompiledQuery {
    fn parse(selector: &str) -> Result<Self, SurfaceError> {
        let query = TextQuery::parse(selector)?;
        let css = Selector::parse(&query.css)
            .map_err(|_| SurfaceError::new(SurfaceFailure::InvalidSelector, selector))?;
        Ok(Self { css, query })
    }

    fn accepts(&self, element: ElementRef<'_>) -> bool {
        self.query.text.is_none() || self.query.accepts_text(&element.text().collect::<String>())
    }
}

fn elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.tree.root().descendants().filter_map(ElementRef::wrap)
}

fn element_at(document: &Html, node: u64) -> Result<ElementRef<'_>, SurfaceError> {
    elements(document)
        .nth(node as usize)
        .ok_or_else(|| SurfaceError::new(SurfaceFailure::StaleElement, format!("node {node}")))
}

fn node_index(document: &Html, element: ElementRef<'_>) -> u64 {
    elements(document)
        .position(|candidate| candidate.id() == element.id())
        .unwrap_or_default() as u64
}
