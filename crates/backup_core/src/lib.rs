//! Backup core: pure domain types and the extraction state machine.
mod config;
mod date;
mod extraction;
mod index;
mod item;
mod naming;

pub use config::{ConfigError, DerivedConverterKind, RunConfig};
pub use date::{format_timestamp, normalize_posted_date, parse_posted_date};
pub use extraction::{ExtractionState, PassMark, Termination};
pub use index::{merge, ItemIndex};
pub use item::{Item, ItemFiles, Representation, RepresentationSet};
pub use naming::{escape_quotes, format_username, sanitize_filename};
