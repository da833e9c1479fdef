//! Reading resource bytes from disk.
//!
//! # Responsibilities
//! - Read regular files fully
//! - Optionally keep file bytes in memory until the modification time changes
//!
//! # Design Decisions
//! - Cache validity is exact equality of the modification time
//! - The cache entry stays locked from the check to the update, so two
//!   workers never both re-read one file for the same change

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::content::ContentError;
use crate::observability::metrics;

/// Bytes of a file together with its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub modified: SystemTime,
}

/// Where file bytes come from.
pub trait ContentSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<SourceFile, ContentError>;
}

/// Reads straight from disk on every call.
#[derive(Debug, Default)]
pub struct FileSource {
    disk_reads: AtomicU64,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times file contents were read from disk.
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }

    fn modified(path: &Path) -> Result<SystemTime, ContentError> {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ContentError::read(path, source))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, ContentError> {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(path = %path.display(), "Reading file from disk");
        fs::read(path).map_err(|source| ContentError::read(path, source))
    }
}

impl ContentSource for FileSource {
    fn read(&self, path: &Path) -> Result<SourceFile, ContentError> {
        let modified = Self::modified(path)?;
        let bytes = self.read_bytes(path)?;
        Ok(SourceFile { bytes, modified })
    }
}

/// Keeps file bytes in memory, re-reading a file only when its
/// modification time differs from the cached one.
#[derive(Debug, Default)]
pub struct CachedSource {
    files: FileSource,
    entries: DashMap<PathBuf, SourceFile>,
}

impl CachedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disk_reads(&self) -> u64 {
        self.files.disk_reads()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentSource for CachedSource {
    fn read(&self, path: &Path) -> Result<SourceFile, ContentError> {
        let modified = FileSource::modified(path)?;

        match self.entries.entry(path.to_path_buf()) {
            Entry::Occupied(mut entry) => {
                if entry.get().modified == modified {
                    metrics::record_cache_lookup(true);
                    return Ok(entry.get().clone());
                }
                metrics::record_cache_lookup(false);
                let fresh = SourceFile {
                    bytes: self.files.read_bytes(path)?,
                    modified,
                };
                entry.insert(fresh.clone());
                Ok(fresh)
            }
            Entry::Vacant(entry) => {
                metrics::record_cache_lookup(false);
                let fresh = SourceFile {
                    bytes: self.files.read_bytes(path)?,
                    modified,
                };
                entry.insert(fresh.clone());
                Ok(fresh)
            }
        }
    }
}
