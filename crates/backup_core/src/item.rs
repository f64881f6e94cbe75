use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// One harvested answer, keyed by its question text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub question: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<ItemFiles>,
}

impl Item {
    pub fn new(question: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            url: url.into(),
            date_posted: None,
            files: None,
        }
    }

    pub fn with_date_posted(mut self, date_posted: Option<String>) -> Self {
        self.date_posted = date_posted;
        self
    }

    pub fn recorded_path(&self, representation: Representation) -> Option<&str> {
        self.files.as_ref().and_then(|files| files.get(representation))
    }

    pub fn record_path(&mut self, representation: Representation, path: impl Into<String>) {
        self.files
            .get_or_insert_with(ItemFiles::default)
            .set(representation, path.into());
    }

    /// A representation is present when its path is recorded, stays inside the
    /// subject directory, and `exists` confirms the file is on disk.
    pub fn is_present<F>(&self, representation: Representation, exists: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        self.recorded_path(representation)
            .filter(|path| is_contained_path(path))
            .map(exists)
            .unwrap_or(false)
    }

    /// Selection rule for the content pipeline.
    ///
    /// Items without any recorded files always need work. Items with files are
    /// revisited only when `retry_failed` is set and one of the requested
    /// representations (raw is always requested) is not present.
    pub fn needs_materialization<F>(
        &self,
        requested: RepresentationSet,
        retry_failed: bool,
        exists: F,
    ) -> bool
    where
        F: Fn(&str) -> bool,
    {
        if self.files.is_none() {
            return true;
        }
        retry_failed
            && requested
                .iter()
                .any(|representation| !self.is_present(representation, &exists))
    }
}

/// Relative storage paths, one optional field per representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<String>,
}

impl ItemFiles {
    pub fn get(&self, representation: Representation) -> Option<&str> {
        match representation {
            Representation::Raw => self.raw.as_deref(),
            Representation::Clean => self.clean.as_deref(),
            Representation::Derived => self.derived.as_deref(),
        }
    }

    pub fn set(&mut self, representation: Representation, path: String) {
        match representation {
            Representation::Raw => self.raw = Some(path),
            Representation::Clean => self.clean = Some(path),
            Representation::Derived => self.derived = Some(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    Raw,
    Clean,
    Derived,
}

impl Representation {
    pub const ALL: [Representation; 3] = [
        Representation::Raw,
        Representation::Clean,
        Representation::Derived,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Representation::Raw => "raw",
            Representation::Clean => "clean",
            Representation::Derived => "derived",
        }
    }

    /// Subdirectory of the subject directory holding this representation.
    pub fn directory(self) -> &'static str {
        match self {
            Representation::Raw => "raw-html",
            Representation::Clean => "html",
            Representation::Derived => "md",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Representation::Raw | Representation::Clean => "html",
            Representation::Derived => "md",
        }
    }

    /// `{directory}/{stem}.{extension}`, always with forward slashes.
    pub fn relative_path(self, stem: &str) -> String {
        format!("{}/{}.{}", self.directory(), stem, self.extension())
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which representations a run produces. Raw is implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepresentationSet {
    pub clean: bool,
    pub derived: bool,
}

impl RepresentationSet {
    pub fn all() -> Self {
        Self {
            clean: true,
            derived: true,
        }
    }

    pub fn raw_only() -> Self {
        Self {
            clean: false,
            derived: false,
        }
    }

    pub fn contains(&self, representation: Representation) -> bool {
        match representation {
            Representation::Raw => true,
            Representation::Clean => self.clean,
            Representation::Derived => self.derived,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Representation> {
        Representation::ALL
            .into_iter()
            .filter(move |representation| self.contains(*representation))
    }
}

impl Default for RepresentationSet {
    fn default() -> Self {
        Self::all()
    }
}

fn is_contained_path(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with(files: ItemFiles) -> Item {
        let mut item = Item::new("Q", "https://example.com/q");
        item.files = Some(files);
        item
    }

    #[test]
    fn relative_paths_use_representation_directories() {
        assert_eq!(Representation::Raw.relative_path("A-B"), "raw-html/A-B.html");
        assert_eq!(Representation::Clean.relative_path("A-B"), "html/A-B.html");
        assert_eq!(Representation::Derived.relative_path("A-B"), "md/A-B.md");
    }

    #[test]
    fn escaping_paths_are_never_present() {
        let item = item_with(ItemFiles {
            raw: Some("../elsewhere/x.html".into()),
            clean: Some("/etc/passwd".into()),
            derived: Some(String::new()),
        });
        for representation in Representation::ALL {
            assert!(!item.is_present(representation, |_| true));
        }
    }

    #[test]
    fn item_without_files_always_needs_work() {
        let item = Item::new("Q", "u");
        assert!(item.needs_materialization(RepresentationSet::all(), false, |_| true));
    }

    #[test]
    fn recorded_files_are_only_revisited_when_retrying() {
        let item = item_with(ItemFiles {
            raw: Some("raw-html/Q.html".into()),
            clean: Some("html/Q.html".into()),
            derived: None,
        });
        assert!(!item.needs_materialization(RepresentationSet::all(), false, |_| true));
        assert!(item.needs_materialization(RepresentationSet::all(), true, |_| true));
        let without_derived = RepresentationSet {
            clean: true,
            derived: false,
        };
        assert!(!item.needs_materialization(without_derived, true, |_| true));
    }

    #[test]
    fn stale_reference_counts_as_missing() {
        let item = item_with(ItemFiles {
            raw: Some("raw-html/Q.html".into()),
            clean: None,
            derived: None,
        });
        assert!(item.needs_materialization(RepresentationSet::raw_only(), true, |_| false));
        assert!(!item.needs_materialization(RepresentationSet::raw_only(), true, |_| true));
    }

    #[test]
    fn serialized_item_uses_camel_case_and_omits_absent_fields() {
        let item = Item::new("Q", "u").with_date_posted(Some("2024-01-01T00:00:00.000Z".into()));
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(
            json,
            r#"{"question":"Q","url":"u","datePosted":"2024-01-01T00:00:00.000Z"}"#
        );
    }
}
