//! Id-addressed file store for uploaded PDFs.
//!
//! Documents are stored as `<root>/<id>.pdf`. Ids come from clients, so every
//! lookup validates the id against `[A-Za-z0-9_-]{1,64}` before touching the
//! filesystem; `../etc/passwd` never reaches a path join.
//!
//! Writes go through a temp file in the same directory followed by a rename,
//! so a reader never sees a half-written document.

use crate::error::StorageError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_ID_LEN: usize = 64;

/// Whether `id` is safe to turn into a file name.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// PDFs on disk, addressed by opaque id.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` under a fresh id and return the id.
    pub fn save(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let target = self.file_path(&id);
        let mut tmp = self.temp_file()?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.flush())
            .map_err(|source| StorageError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&target).map_err(|e| StorageError::Io {
            path: target.clone(),
            source: e.error,
        })?;
        info!("Stored document {} ({} bytes)", id, bytes.len());
        Ok(id)
    }

    /// Path of the stored document, or `None` for an invalid or unknown id.
    pub fn path_for(&self, id: &str) -> Option<PathBuf> {
        if !is_valid_id(id) {
            debug!("Rejected invalid document id {:?}", id);
            return None;
        }
        let path = self.file_path(id);
        path.is_file().then_some(path)
    }

    /// Remove a stored document. Returns whether anything was deleted.
    pub fn delete(&self, id: &str) -> bool {
        let Some(path) = self.path_for(id) else {
            return false;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not delete {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Overwrite stored document `id` with the file at `source`, then remove
    /// `source`. Used to swap an upload for its OCR-enhanced copy.
    pub fn replace_with(&self, id: &str, source: &Path) -> Result<(), StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        let target = self
            .path_for(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let mut tmp = self.temp_file()?;
        let mut src = std::fs::File::open(source).map_err(|e| StorageError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        std::io::copy(&mut src, tmp.as_file_mut()).map_err(|e| StorageError::Io {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;
        tmp.persist(&target).map_err(|e| StorageError::Io {
            path: target.clone(),
            source: e.error,
        })?;

        if let Err(e) = std::fs::remove_file(source) {
            warn!("Could not remove {}: {}", source.display(), e);
        }
        info!("Replaced stored document {}", id);
        Ok(())
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.pdf"))
    }

    fn temp_file(&self) -> Result<NamedTempFile, StorageError> {
        NamedTempFile::new_in(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })
    }
}
