//! Named queries over the feed and answer page markup.
//!
//! The extractor and the pipeline never build selectors or walk the DOM
//! themselves; everything that depends on the site's markup lives here.

use backup_core::escape_quotes;
use url::Url;

use crate::surface::{AutomationSurface, ElementHandle, Locator, Scope, SurfaceError, ViewId};
use crate::text_query::normalize_text;

pub const DEFAULT_BASE_URL: &str = "https://www.quora.com/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLayout {
    pub base_url: Url,
    /// Matches every rendered question title in the feed.
    pub title_selector: String,
    /// How many levels above a title its answer card sits.
    pub container_levels: usize,
    /// First match inside the card is the question link.
    pub link_selector: String,
    /// Link inside the card whose text is the posted date.
    pub timestamp_selector: String,
}

impl Default for FeedLayout {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("static base url"),
            title_selector: r#"div[class^="QuestionTitle"]"#.to_string(),
            container_levels: 6,
            link_selector: "a".to_string(),
            timestamp_selector: r#"a[class*="answer_timestamp"]"#.to_string(),
        }
    }
}

impl FeedLayout {
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn profile_url(&self, subject: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("profile/{subject}/answers"))
    }

    /// Answer page for a question link: the link resolved against the base,
    /// followed by `/answer/{subject}`.
    pub fn answer_url(&self, href: &str, subject: &str) -> Result<String, url::ParseError> {
        let question = self.base_url.join(href.trim())?;
        Ok(format!(
            "{}/answer/{}",
            question.as_str().trim_end_matches('/'),
            subject
        ))
    }

    /// Text-match selector for one title, with quotes escaped.
    pub fn title_match_selector(&self, title: &str) -> String {
        format!("{}:has-text(\"{}\")", self.title_selector, escape_quotes(title))
    }

    pub async fn locate_titles<S>(
        &self,
        surface: &S,
        view: ViewId,
    ) -> Result<Vec<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        surface.query_all(view, &self.title_selector).await
    }

    /// Find a title again after clicking it re-rendered the card.
    ///
    /// The text match only narrows the candidates to titles containing
    /// `title`; the first whose whole text equals it is returned.
    pub async fn relocate_title<S>(
        &self,
        surface: &S,
        view: ViewId,
        title: &str,
    ) -> Result<Option<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        let wanted = normalize_text(title);
        let selector = self.title_match_selector(title);
        for candidate in surface.query_all(view, &selector).await? {
            if normalize_text(&surface.read_text(candidate).await?) == wanted {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    pub async fn locate_item_container<S>(
        &self,
        surface: &S,
        title: ElementHandle,
    ) -> Result<Option<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        surface
            .query_one(
                Scope::Element(title),
                Locator::Ancestor(self.container_levels),
            )
            .await
    }

    pub async fn locate_question_link<S>(
        &self,
        surface: &S,
        container: ElementHandle,
    ) -> Result<Option<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        surface
            .query_one(Scope::Element(container), Locator::Css(&self.link_selector))
            .await
    }

    pub async fn locate_timestamp_link<S>(
        &self,
        surface: &S,
        container: ElementHandle,
    ) -> Result<Option<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        surface
            .query_one(
                Scope::Element(container),
                Locator::Css(&self.timestamp_selector),
            )
            .await
    }
}

/// Where the answer body sits on an answer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    pub container_selector: String,
    /// Index among the matches; the first match is the question header.
    pub container_index: usize,
}

impl Default for ContentLayout {
    fn default() -> Self {
        Self {
            container_selector: "span.qu-userSelect--text".to_string(),
            container_index: 1,
        }
    }
}

impl ContentLayout {
    pub async fn locate_content<S>(
        &self,
        surface: &S,
        view: ViewId,
    ) -> Result<Option<ElementHandle>, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        let matches = surface.query_all(view, &self.container_selector).await?;
        Ok(matches.get(self.container_index).copied())
    }

    /// Whether the container holds at least one element, not just text.
    pub async fn has_child_elements<S>(
        &self,
        surface: &S,
        container: ElementHandle,
    ) -> Result<bool, SurfaceError>
    where
        S: AutomationSurface + ?Sized,
    {
        let first = surface
            .query_one(Scope::Element(container), Locator::Css("*"))
            .await?;
        Ok(first.is_some())
    }
}
