use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backup_core::{Item, ItemIndex};
use backup_logging::{backup_debug, backup_warn};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

pub const INDEX_FILENAME: &str = "answers.json";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read index file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode index: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write index: {0}")]
    Persist(#[from] PersistError),
}

/// The subject's `answers.json`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_subject(output_root: &Path, subject: &str) -> Self {
        Self::new(output_root.join(subject).join(INDEX_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index. A missing file is an empty index; anything that is not a
    /// JSON array of items is corrupt.
    pub fn load(&self) -> Result<ItemIndex, IndexError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                backup_debug!("No index at {}, starting empty", self.path.display());
                return Ok(ItemIndex::new());
            }
            Err(source) => {
                return Err(IndexError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let items: Vec<Item> =
            serde_json::from_str(&text).map_err(|source| IndexError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        let (index, dropped) = ItemIndex::from_items(items);
        if dropped > 0 {
            backup_warn!(
                "Dropped {} duplicate question(s) from {}",
                dropped,
                self.path.display()
            );
        }
        Ok(index)
    }

    /// Replace the file with the full index.
    pub fn persist(&self, index: &ItemIndex) -> Result<(), IndexError> {
        let json = serde_json::to_string_pretty(index.items()).map_err(IndexError::Encode)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(INDEX_FILENAME);
        AtomicFileWriter::new(dir).write(filename, &json)?;
        Ok(())
    }
}
