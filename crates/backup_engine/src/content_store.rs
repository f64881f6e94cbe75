use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backup_core::{sanitize_filename, Item, Representation, RepresentationSet};

use crate::persist::{ensure_dir, AtomicFileWriter, PersistError};

/// A subject's content directory: `raw-html/`, `html/` and `md/`, all paths
/// relative to the subject directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    writer: AtomicFileWriter,
}

impl ContentStore {
    pub fn new(subject_dir: impl Into<PathBuf>) -> Self {
        let root = subject_dir.into();
        Self {
            writer: AtomicFileWriter::new(root.clone()),
            root,
        }
    }

    pub fn for_subject(output_root: &Path, subject: &str) -> Self {
        Self::new(output_root.join(subject))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a representation of `question` is stored.
    pub fn relative_path(representation: Representation, question: &str) -> String {
        representation.relative_path(&sanitize_filename(question))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).is_file()
    }

    pub fn is_present(&self, item: &Item, representation: Representation) -> bool {
        item.is_present(representation, |relative| self.exists(relative))
    }

    pub fn ensure_dirs(&self, requested: RepresentationSet) -> Result<(), PersistError> {
        for representation in requested.iter() {
            ensure_dir(&self.root.join(representation.directory()))?;
        }
        Ok(())
    }

    /// Content of the item's recorded raw file.
    pub fn read_raw(&self, item: &Item) -> io::Result<String> {
        let relative = item.recorded_path(Representation::Raw).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no raw file recorded")
        })?;
        fs::read_to_string(self.root.join(relative))
    }

    /// Write and verify one representation, returning the relative path to record.
    pub fn write_verified(
        &self,
        representation: Representation,
        question: &str,
        content: &str,
    ) -> Result<String, PersistError> {
        let relative = Self::relative_path(representation, question);
        self.writer.write_verified(&relative, content)?;
        Ok(relative)
    }
}
