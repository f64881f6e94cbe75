mod common;

use std::sync::Arc;
use std::time::Duration;

use backup_core::{ItemIndex, Termination};
use backup_engine::{
    AutomationSurface, ContentLayout, ExtractSettings, FeedExtractor, FeedLayout, Locator,
    NullSink, Scope, StaticHtmlSurface, SurfaceFailure, ViewId, SCROLL_HEIGHT_EXPR,
    SCROLL_TO_BOTTOM_EXPR,
};
use chrono::{TimeZone, Utc};
use common::{init_logging, MemoryPageSource};
use pretty_assertions::assert_eq;

const PROFILE: &str = "https://www.quora.com/profile/Jane-Doe/answers";

fn card(title: &str, href: &str, date: &str) -> String {
    format!(
        r#"<div class="card"><a class="q" href="{href}">{title}</a><a class="c answer_timestamp_x">{date}</a><div><div><div><div><div><div class="QuestionTitle_abc">{title}</div></div></div></div></div></div></div>"#
    )
}

fn feed_page() -> String {
    format!(
        "<html><body>{}{}</body></html>",
        card(r#"Is "safe" Rust safe?"#, "/Is-safe-Rust-safe", "Mar 1"),
        card("Why Go", "/Why-Go", "2y"),
    )
}

fn surface() -> StaticHtmlSurface<MemoryPageSource> {
    StaticHtmlSurface::new(MemoryPageSource::default().with_page(PROFILE, &feed_page()).with_page(
        "https://www.quora.com/Why-Go/answer/Jane-Doe",
        r#"<html><body><span class="qu-userSelect--text">Why Go</span><span class="qu-userSelect--text"><p>Because.</p></span></body></html>"#,
    ))
}

#[tokio::test]
async fn text_match_finds_quoted_titles() {
    let surface = surface();
    let view = surface.primary_view();
    surface.navigate(view, PROFILE).await.unwrap();
    let layout = FeedLayout::default();

    let titles = layout.locate_titles(&surface, view).await.unwrap();
    assert_eq!(titles.len(), 2);
    assert_eq!(
        surface.read_text(titles[0]).await.unwrap(),
        r#"Is "safe" Rust safe?"#
    );

    let found = layout
        .relocate_title(&surface, view, r#"Is "safe" Rust safe?"#)
        .await
        .unwrap();
    assert_eq!(found, Some(titles[0]));

    let container = layout
        .locate_item_container(&surface, titles[1])
        .await
        .unwrap()
        .expect("card");
    let link = layout
        .locate_question_link(&surface, container)
        .await
        .unwrap()
        .expect("link");
    assert_eq!(
        surface.read_attribute(link, "href").await.unwrap().as_deref(),
        Some("/Why-Go")
    );
    let stamp = layout
        .locate_timestamp_link(&surface, container)
        .await
        .unwrap()
        .expect("timestamp");
    assert_eq!(surface.read_text(stamp).await.unwrap(), "2y");
}

#[tokio::test]
async fn relocating_skips_titles_that_only_contain_the_text() {
    let page = format!(
        "<html><body>{}{}</body></html>",
        card("Why Rust is great", "/Why-Rust-is-great", "Mar 1"),
        card("Rust", "/Rust", "Mar 2"),
    );
    let surface = StaticHtmlSurface::new(MemoryPageSource::default().with_page(PROFILE, &page));
    let view = surface.primary_view();
    surface.navigate(view, PROFILE).await.unwrap();
    let layout = FeedLayout::default();

    let titles = layout.locate_titles(&surface, view).await.unwrap();
    assert_eq!(titles.len(), 2);
    let found = layout.relocate_title(&surface, view, "Rust").await.unwrap();
    assert_eq!(found, Some(titles[1]));
    let missing = layout.relocate_title(&surface, view, "Why").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn scroll_extent_never_grows() {
    let surface = surface();
    let view = surface.primary_view();
    surface.navigate(view, PROFILE).await.unwrap();

    let before = surface.evaluate(view, SCROLL_HEIGHT_EXPR).await.unwrap();
    surface.evaluate(view, SCROLL_TO_BOTTOM_EXPR).await.unwrap();
    let after = surface.evaluate(view, SCROLL_HEIGHT_EXPR).await.unwrap();
    assert_eq!(before, after);

    let err = surface.evaluate(view, "alert(1)").await.unwrap_err();
    assert_eq!(err.kind, SurfaceFailure::UnsupportedExpression);
}

#[tokio::test]
async fn views_open_and_close() {
    let surface = surface();
    let view = surface.open_view().await.unwrap();
    assert_eq!(surface.open_views(), 2);

    let err = surface
        .query_all(view, "span")
        .await
        .unwrap_err();
    assert_eq!(err.kind, SurfaceFailure::NotLoaded);

    surface
        .navigate(view, "https://www.quora.com/Why-Go/answer/Jane-Doe")
        .await
        .unwrap();
    let content = ContentLayout::default()
        .locate_content(&surface, view)
        .await
        .unwrap()
        .expect("content");
    assert!(ContentLayout::default()
        .has_child_elements(&surface, content)
        .await
        .unwrap());
    assert_eq!(
        surface.read_inner_markup(content).await.unwrap(),
        "<p>Because.</p>"
    );

    surface.close_view(view).await.unwrap();
    assert_eq!(surface.open_views(), 1);
    let err = surface.navigate(view, PROFILE).await.unwrap_err();
    assert_eq!(err.kind, SurfaceFailure::UnknownView(view));

    surface.close_view(surface.primary_view()).await.unwrap();
    assert_eq!(surface.open_views(), 1);
    assert_eq!(
        surface
            .query_one(Scope::View(ViewId(99)), Locator::Css("a"))
            .await
            .unwrap_err()
            .kind,
        SurfaceFailure::UnknownView(ViewId(99))
    );
}

#[tokio::test]
async fn missing_pages_fail_navigation() {
    let surface = surface();
    let err = surface
        .navigate(surface.primary_view(), "https://www.quora.com/nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, SurfaceFailure::HttpStatus(404));
}

#[tokio::test]
async fn feed_walk_over_static_markup_ends_exhausted() {
    init_logging();
    let surface = surface();
    surface
        .navigate(surface.primary_view(), PROFILE)
        .await
        .unwrap();
    let layout = FeedLayout::default();
    let settings = ExtractSettings {
        target: 5,
        max_retries: 20,
        scroll_settle: Duration::ZERO,
        click_settle: Duration::ZERO,
        debug_markup: true,
        clock: Arc::new(|| Utc.with_ymd_and_hms(2024, 3, 13, 15, 30, 0).unwrap()),
    };

    let outcome = FeedExtractor::new(&surface, &layout, settings)
        .run("Jane-Doe", &ItemIndex::new(), &NullSink)
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::ExhaustedFeed);
    assert_eq!(outcome.passes, 1);
    let urls: Vec<_> = outcome.discovered.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.quora.com/Is-safe-Rust-safe/answer/Jane-Doe",
            "https://www.quora.com/Why-Go/answer/Jane-Doe",
        ]
    );
    assert_eq!(
        outcome.discovered[1].date_posted.as_deref(),
        Some("2022-03-13T15:30:00.000Z")
    );
}
