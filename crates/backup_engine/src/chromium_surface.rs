//! An [`AutomationSurface`] backed by a Chrome or Chromium instance driven
//! over the DevTools protocol.
//!
//! Every view is a browser tab. Element handles map to remote objects held
//! on this side; they are dropped when their tab navigates or closes, after
//! which using them fails with [`SurfaceFailure::StaleElement`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backup_logging::{backup_debug, backup_trace};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::surface::{
    AutomationSurface, ElementHandle, Locator, Scope, SurfaceError, SurfaceFailure, ViewId,
};
use crate::text_query::{normalize_text, TextQuery};

const PRIMARY_VIEW: ViewId = ViewId(0);
const BLANK_PAGE: &str = "about:blank";
/// Attribute briefly set on an ancestor so it can be found by selector.
const REF_ATTRIBUTE: &str = "data-answer-backup-ref";

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Browser binary; when unset the usual install locations are searched.
    pub chrome_executable: Option<PathBuf>,
    /// Upper bound for a single DevTools request, page loads included.
    pub request_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserSettings {
    fn browser_config(&self) -> Result<BrowserConfig, SurfaceError> {
        let mut builder = BrowserConfig::builder().request_timeout(self.request_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|message| SurfaceError::new(SurfaceFailure::Browser, message))
    }
}

struct TrackedElement {
    view: ViewId,
    element: Arc<Element>,
}

pub struct ChromiumSurface {
    browser: Browser,
    events: JoinHandle<()>,
    views: Mutex<HashMap<ViewId, Page>>,
    elements: Mutex<HashMap<u64, TrackedElement>>,
    next_view: AtomicU64,
    next_node: AtomicU64,
    next_ref: AtomicU64,
}

impl ChromiumSurface {
    /// Start the browser and open the primary tab.
    pub async fn launch(settings: BrowserSettings) -> Result<Self, SurfaceError> {
        let config = settings.browser_config()?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    backup_trace!("DevTools event error: {}", err);
                }
            }
        });

        let page = browser.new_page(BLANK_PAGE).await.map_err(cdp_error)?;
        backup_debug!(
            "Browser started ({})",
            if settings.headless { "headless" } else { "windowed" }
        );

        let mut views = HashMap::new();
        views.insert(PRIMARY_VIEW, page);
        Ok(Self {
            browser,
            events,
            views: Mutex::new(views),
            elements: Mutex::new(HashMap::new()),
            next_view: AtomicU64::new(PRIMARY_VIEW.0 + 1),
            next_node: AtomicU64::new(0),
            next_ref: AtomicU64::new(0),
        })
    }

    /// Close the browser and wait for its process to exit.
    pub async fn shutdown(mut self) -> Result<(), SurfaceError> {
        self.views().clear();
        self.elements().clear();
        self.browser.close().await.map_err(cdp_error)?;
        if let Err(err) = self.browser.wait().await {
            backup_debug!("Browser did not exit cleanly: {}", err);
        }
        self.events.abort();
        Ok(())
    }

    fn views(&self) -> MutexGuard<'_, HashMap<ViewId, Page>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elements(&self) -> MutexGuard<'_, HashMap<u64, TrackedElement>> {
        self.elements.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn page(&self, view: ViewId) -> Result<Page, SurfaceError> {
        self.views()
            .get(&view)
            .cloned()
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::UnknownView(view), "view is closed"))
    }

    fn element(&self, handle: ElementHandle) -> Result<Arc<Element>, SurfaceError> {
        self.elements()
            .get(&handle.node)
            .filter(|tracked| tracked.view == handle.view)
            .map(|tracked| Arc::clone(&tracked.element))
            .ok_or_else(|| {
                SurfaceError::new(SurfaceFailure::StaleElement, format!("node {}", handle.node))
            })
    }

    fn track(&self, view: ViewId, element: Element) -> ElementHandle {
        let node = self.next_node.fetch_add(1, Ordering::Relaxed);
        self.elements().insert(
            node,
            TrackedElement {
                view,
                element: Arc::new(element),
            },
        );
        ElementHandle { view, node }
    }

    fn forget_view(&self, view: ViewId) {
        self.elements().retain(|_, tracked| tracked.view != view);
    }

    /// Keep the candidates whose text satisfies the query, in order.
    async fn filter_text(
        &self,
        query: &TextQuery,
        candidates: Vec<Element>,
    ) -> Result<Vec<Element>, SurfaceError> {
        if query.text.is_none() {
            return Ok(candidates);
        }
        let mut kept = Vec::with_capacity(candidates.len());
        for element in candidates {
            let text = element.inner_text().await.map_err(cdp_error)?;
            if query.accepts_text(text.as_deref().unwrap_or_default()) {
                kept.push(element);
            }
        }
        Ok(kept)
    }

    async fn ancestor(
        &self,
        handle: ElementHandle,
        levels: usize,
    ) -> Result<Option<Element>, SurfaceError> {
        let element = self.element(handle)?;
        let marker = self.next_ref.fetch_add(1, Ordering::Relaxed);
        let marked = element
            .call_js_fn(mark_ancestor_script(levels, marker), false)
            .await
            .map_err(cdp_error)?;
        if marked.result.value != Some(Value::Bool(true)) {
            return Ok(None);
        }

        let page = self.page(handle.view)?;
        let found = page
            .find_elements(format!(r#"[{REF_ATTRIBUTE}="{marker}"]"#))
            .await
            .map_err(cdp_error)?
            .into_iter()
            .next();
        if let Some(ancestor) = &found {
            ancestor
                .call_js_fn(unmark_script(), false)
                .await
                .map_err(cdp_error)?;
        }
        Ok(found)
    }
}

#[async_trait::async_trait]
impl AutomationSurface for ChromiumSurface {
    fn primary_view(&self) -> ViewId {
        PRIMARY_VIEW
    }

    async fn navigate(&self, view: ViewId, url: &str) -> Result<(), SurfaceError> {
        let page = self.page(view)?;
        url::Url::parse(url)
            .map_err(|err| SurfaceError::new(SurfaceFailure::InvalidUrl, format!("{url}: {err}")))?;
        self.forget_view(view);
        page.goto(url).await.map_err(cdp_error)?;
        backup_debug!("Navigated view {} to {}", view.0, url);
        Ok(())
    }

    async fn query_all(
        &self,
        view: ViewId,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, SurfaceError> {
        let query = checked_query(selector)?;
        let page = self.page(view)?;
        let candidates = page.find_elements(query.css.as_str()).await.map_err(cdp_error)?;
        let matched = self.filter_text(&query, candidates).await?;
        Ok(matched
            .into_iter()
            .map(|element| self.track(view, element))
            .collect())
    }

    async fn query_one(
        &self,
        scope: Scope,
        locator: Locator<'_>,
    ) -> Result<Option<ElementHandle>, SurfaceError> {
        let found = match (scope, locator) {
            (Scope::View(view), Locator::Css(selector)) => {
                let query = checked_query(selector)?;
                let page = self.page(view)?;
                let candidates = page.find_elements(query.css.as_str()).await.map_err(cdp_error)?;
                self.filter_text(&query, candidates).await?.into_iter().next()
            }
            (Scope::View(_), Locator::Ancestor(_)) => None,
            (Scope::Element(handle), Locator::Css(selector)) => {
                let query = checked_query(selector)?;
                let base = self.element(handle)?;
                let candidates = base.find_elements(query.css.as_str()).await.map_err(cdp_error)?;
                self.filter_text(&query, candidates).await?.into_iter().next()
            }
            (Scope::Element(handle), Locator::Ancestor(levels)) => {
                self.ancestor(handle, levels).await?
            }
        };
        let view = match scope {
            Scope::View(view) => view,
            Scope::Element(handle) => handle.view,
        };
        Ok(found.map(|element| self.track(view, element)))
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        let text = self.element(element)?.inner_text().await.map_err(cdp_error)?;
        Ok(normalize_text(text.as_deref().unwrap_or_default()))
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SurfaceError> {
        self.element(element)?
            .attribute(name)
            .await
            .map_err(cdp_error)
    }

    async fn read_inner_markup(&self, element: ElementHandle) -> Result<String, SurfaceError> {
        let markup = self.element(element)?.inner_html().await.map_err(cdp_error)?;
        Ok(markup.unwrap_or_default())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), SurfaceError> {
        self.element(element)?.click().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn evaluate(&self, view: ViewId, expression: &str) -> Result<Value, SurfaceError> {
        let page = self.page(view)?;
        let result = page.evaluate(expression).await.map_err(cdp_error)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn open_view(&self) -> Result<ViewId, SurfaceError> {
        let page = self.browser.new_page(BLANK_PAGE).await.map_err(cdp_error)?;
        let view = ViewId(self.next_view.fetch_add(1, Ordering::Relaxed));
        self.views().insert(view, page);
        Ok(view)
    }

    async fn close_view(&self, view: ViewId) -> Result<(), SurfaceError> {
        if view == PRIMARY_VIEW {
            return Ok(());
        }
        let page = self
            .views()
            .remove(&view)
            .ok_or_else(|| SurfaceError::new(SurfaceFailure::UnknownView(view), "already closed"))?;
        self.forget_view(view);
        page.close().await.map_err(cdp_error)
    }
}

/// Parse the selector and validate its CSS part up front, so a bad layout
/// selector reports [`SurfaceFailure::InvalidSelector`] rather than a
/// protocol error.
fn checked_query(selector: &str) -> Result<TextQuery, SurfaceError> {
    let query = TextQuery::parse(selector)?;
    scraper::Selector::parse(&query.css)
        .map_err(|_| SurfaceError::new(SurfaceFailure::InvalidSelector, selector))?;
    Ok(query)
}

/// Walks `levels` parents up from `this` and tags the element reached.
/// Evaluates to false when the tree is not that deep.
fn mark_ancestor_script(levels: usize, marker: u64) -> String {
    format!(
        "function() {{ let el = this; for (let i = 0; i < {levels} && el; i++) {{ el = el.parentElement; }} \
         if (!el) {{ return false; }} el.setAttribute('{REF_ATTRIBUTE}', '{marker}'); return true; }}"
    )
}

fn unmark_script() -> String {
    format!("function() {{ this.removeAttribute('{REF_ATTRIBUTE}'); }}")
}

fn cdp_error(err: CdpError) -> SurfaceError {
    let kind = match err {
        CdpError::Timeout => SurfaceFailure::Timeout,
        _ => SurfaceFailure::Browser,
    };
    SurfaceError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_headless() {
        let settings = BrowserSettings::default();
        assert!(settings.headless);
        assert!(settings.chrome_executable.is_none());
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn ancestor_script_embeds_depth_and_marker() {
        let script = mark_ancestor_script(6, 42);
        assert!(script.starts_with("function()"));
        assert!(script.contains("i < 6"));
        assert!(script.contains("'data-answer-backup-ref', '42'"));
        assert!(unmark_script().contains("removeAttribute('data-answer-backup-ref')"));
    }

    #[test]
    fn selectors_are_checked_before_reaching_the_browser() {
        let query = checked_query(r#"div.q:has-text("Rust")"#).unwrap();
        assert_eq!(query.css, "div.q");
        let err = checked_query("div[").unwrap_err();
        assert_eq!(err.kind, SurfaceFailure::InvalidSelector);
    }

    #[test]
    fn timeouts_keep_their_kind() {
        assert_eq!(cdp_error(CdpError::Timeout).kind, SurfaceFailure::Timeout);
    }
}
