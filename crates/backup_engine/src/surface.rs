//! The browser-automation capability the extractor and pipeline drive.
//!
//! One surface is one navigable session. Callers issue operations one at a
//! time and await each before the next.

use std::fmt;
use std::time::Duration;

/// Reads the page's scrollable extent. Evaluates to a number.
pub const SCROLL_HEIGHT_EXPR: &str = "document.body.scrollHeight";
/// Scrolls the page to the bottom. Evaluates to null.
pub const SCROLL_TO_BOTTOM_EXPR: &str = "window.scrollTo(0, document.body.scrollHeight)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// Opaque reference to an element rendered in a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub view: ViewId,
    pub node: u64,
}

/// Where a single-element query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    View(ViewId),
    Element(ElementHandle),
}

/// What a single-element query looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    /// First element matching a selector, searched below the scope.
    Css(&'a str),
    /// The element `n` levels above the scoped element.
    Ancestor(usize),
}

#[async_trait::async_trait]
pub trait AutomationSurface: Send + Sync {
    /// The view opened together with the session; feed pagination happens here.
    fn primary_view(&self) -> ViewId;

    /// Load `url` into `view` and return once the network is idle.
    async fn navigate(&self, view: ViewId, url: &str) -> Result<(), SurfaceError>;

    async fn query_all(
        &self,
        view: ViewId,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, SurfaceError>;

    async fn query_one(
        &self,
        scope: Scope,
        locator: Locator<'_>,
    ) -> Result<Option<ElementHandle>, SurfaceError>;

    async fn read_text(&self, element: ElementHandle) -> Result<String, SurfaceError>;

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, SurfaceError>;

    async fn read_inner_markup(&self, element: ElementHandle) -> Result<String, SurfaceError>;

    async fn click(&self, element: ElementHandle) -> Result<(), SurfaceError>;

    async fn wait(&self, duration: Duration);

    /// Only [`SCROLL_HEIGHT_EXPR`] and [`SCROLL_TO_BOTTOM_EXPR`] are issued.
    async fn evaluate(
        &self,
        view: ViewId,
        expression: &str,
    ) -> Result<serde_json::Value, SurfaceError>;

    async fn open_view(&self) -> Result<ViewId, SurfaceError>;

    async fn close_view(&self, view: ViewId) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SurfaceError {
    pub kind: SurfaceFailure,
    pub message: String,
}

impl SurfaceError {
    pub fn new(kind: SurfaceFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Network,
    InvalidSelector,
    UnknownView(ViewId),
    StaleElement,
    NotLoaded,
    UnsupportedExpression,
    /// The browser process or its DevTools connection failed.
    Browser,
}

impl fmt::Display for SurfaceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceFailure::InvalidUrl => write!(f, "invalid url"),
            SurfaceFailure::HttpStatus(code) => write!(f, "http status {code}"),
            SurfaceFailure::Timeout => write!(f, "timeout"),
            SurfaceFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            SurfaceFailure::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            SurfaceFailure::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            SurfaceFailure::Decode => write!(f, "decode error"),
            SurfaceFailure::Network => write!(f, "network error"),
            SurfaceFailure::InvalidSelector => write!(f, "invalid selector"),
            SurfaceFailure::UnknownView(view) => write!(f, "unknown view {}", view.0),
            SurfaceFailure::StaleElement => write!(f, "stale element"),
            SurfaceFailure::NotLoaded => write!(f, "view has no document"),
            SurfaceFailure::UnsupportedExpression => write!(f, "unsupported expression"),
            SurfaceFailure::Browser => write!(f, "browser error"),
        }
    }
}
