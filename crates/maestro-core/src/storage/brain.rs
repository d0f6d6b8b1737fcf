use std::path::{Path, PathBuf};

use crate::config::RetentionLimits;
use crate::error::CoreError;
use crate::model::{MemoryBatch, MemoryEntry};
use crate::storage::atomic::{archive, write_atomic};
use crate::storage::merge::{MergeStats, Preserved};

/// The line-delimited memory store (`brain.jsonl`).
///
/// Every write is a full rewrite through [`write_atomic`]; the file is never
/// edited in place. Other tools keep their own entries in the same file, so
/// anything this crate does not recognise is carried through untouched.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// All entries in file order. A missing store is empty.
    ///
    /// Lines are split on raw bytes so a foreign line that is not UTF-8 is
    /// kept as it is instead of failing the whole read.
    pub fn read(&self) -> Result<Vec<MemoryEntry>, CoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(data
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(MemoryEntry::parse_bytes)
            .collect())
    }

    /// Entries bucketed by category.
    pub fn preserved(&self) -> Result<Preserved, CoreError> {
        Ok(Preserved::from_entries(self.read()?))
    }

    /// Rewrite the store with exactly these entries.
    pub fn write(&self, entries: &[MemoryEntry]) -> Result<(), CoreError> {
        let mut buf = Vec::new();
        for entry in entries {
            buf.extend_from_slice(&entry.to_bytes()?);
            buf.push(b'\n');
        }
        write_atomic(&self.path, &buf)
    }

    /// Read, merge `batch` in, and rewrite in category order.
    ///
    /// An empty batch leaves the file untouched.
    pub fn merge(
        &self,
        batch: &MemoryBatch,
        limits: &RetentionLimits,
    ) -> Result<MergeStats, CoreError> {
        if batch.is_empty() {
            return Ok(MergeStats::default());
        }
        let mut preserved = self.preserved()?;
        let stats = preserved.merge(batch, limits);
        if stats.added == 0 && stats.evicted == 0 {
            tracing::debug!(path = %self.path.display(), "Nothing new to merge");
            return Ok(stats);
        }
        self.write(&preserved.into_entries())?;
        tracing::debug!(
            path = %self.path.display(),
            added = stats.added,
            duplicates = stats.duplicates,
            evicted = stats.evicted,
            "Memory store rewritten"
        );
        Ok(stats)
    }

    /// Move the store aside so a fresh project starts with no memory.
    pub fn archive(&self) -> Result<Option<PathBuf>, CoreError> {
        archive(&self.path)
    }
}
