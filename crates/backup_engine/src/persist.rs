use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory {path} is missing or not writable: {reason}")]
    Directory { path: PathBuf, reason: String },
    #[error("written file {0} is not on disk")]
    Unverified(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Create `dir` (and its parents) unless it already exists as a directory.
pub fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    let failed = |reason: String| PersistError::Directory {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(failed("path is not a directory".into())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| failed(e.to_string()))
        }
        Err(err) => Err(failed(err.to_string())),
    }
}

/// Replaces whole files under one directory by writing a sibling temp file and
/// renaming it over the target, so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to `{dir}/{relative}`, creating intermediate directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(relative);
        let parent = target.parent().unwrap_or(&self.dir).to_path_buf();
        ensure_dir(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// [`write`](Self::write), then confirm the target exists.
    pub fn write_verified(&self, relative: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.write(relative, content)?;
        if target.is_file() {
            Ok(target)
        } else {
            Err(PersistError::Unverified(target))
        }
    }
}
