//! Backup engine: automation surface, feed walk, storage and content pipeline.
mod backup;
mod chromium_surface;
mod clean;
mod content_store;
mod convert;
mod decode;
mod extractor;
mod fetch;
mod index_store;
mod layout;
mod markup;
mod materialize;
mod persist;
mod progress;
mod static_surface;
mod surface;
mod template;
mod text_query;
mod tidy;

pub use backup::{check_surface, clean_subject, run_backup, BackupContext, BackupError, BackupSummary};
pub use chromium_surface::{BrowserSettings, ChromiumSurface};
pub use clean::{clean_markup, wrap_text};
pub use content_store::ContentStore;
pub use convert::{converter_for, derive_markup, Converter, Html2MdConverter, PlainMarkupConverter};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use extractor::{Clock, ExtractSettings, ExtractionOutcome, FeedExtractor, ItemExtractError};
pub use fetch::{FetchSettings, LoadedPage, PageSource, ReqwestPageSource};
pub use index_store::{IndexError, IndexStore, INDEX_FILENAME};
pub use layout::{ContentLayout, FeedLayout, DEFAULT_BASE_URL};
pub use materialize::{
    MaterializeError, MaterializeReport, MaterializeSettings, Materializer, RepresentationCounts,
};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use progress::{BackupEvent, NullSink, ProgressSink, SkipReason};
pub use static_surface::StaticHtmlSurface;
pub use surface::{
    AutomationSurface, ElementHandle, Locator, Scope, SurfaceError, SurfaceFailure, ViewId,
    SCROLL_HEIGHT_EXPR, SCROLL_TO_BOTTOM_EXPR,
};
pub use template::{default_search_dirs, load_template, Template, TemplateError};
pub use tidy::tidy_document;
