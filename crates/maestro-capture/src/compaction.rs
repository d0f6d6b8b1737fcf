//! Captures the host's compaction summary right before context is lost.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use maestro_core::config::{RetentionLimits, RetryPolicy};
use maestro_core::model::{CompactNote, MemoryBatch, TranscriptRecord};
use maestro_core::storage::MemoryStore;

use crate::classify::signals::is_summary_shaped;
use crate::error::CaptureError;

/// Only the tail of a transcript is scanned.
pub const TAIL_SCAN_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(CompactNote),
    /// Identical to the most recent stored summary.
    Duplicate,
    NotFound,
}

/// Find the most recent compaction summary in a transcript.
///
/// A record flagged by the host wins over one that only looks like a summary.
pub fn find_latest_summary(path: &Path) -> Result<Option<String>, CaptureError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_SCAN_BYTES);
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)?;

    let mut lines = buf.split(|b| *b == b'\n');
    if start > 0 {
        // First line is probably cut in half.
        lines.next();
    }
    let lines: Vec<&[u8]> = lines.collect();

    let mut heuristic: Option<String> = None;
    for line in lines.into_iter().rev() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let Ok(record) = serde_json::from_slice::<TranscriptRecord>(line) else {
            continue;
        };
        let text = record.text();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if record.is_flagged_summary() {
            return Ok(Some(text.to_string()));
        }
        if heuristic.is_none() && is_summary_shaped(text) {
            heuristic = Some(text.to_string());
        }
    }
    Ok(heuristic)
}

/// Retries the tail scan while the host finishes writing the summary.
pub struct CompactionCapturer<'a> {
    store: &'a MemoryStore,
    limits: RetentionLimits,
    retry: RetryPolicy,
}

impl<'a> CompactionCapturer<'a> {
    pub fn new(store: &'a MemoryStore, limits: RetentionLimits, retry: RetryPolicy) -> Self {
        Self {
            store,
            limits,
            retry,
        }
    }

    pub fn capture(
        &self,
        transcript: &Path,
        trigger: Option<&str>,
    ) -> Result<CaptureOutcome, CaptureError> {
        let Some(summary) = self.find_with_retry(transcript, find_latest_summary) else {
            tracing::debug!(path = %transcript.display(), "No compaction summary found");
            return Ok(CaptureOutcome::NotFound);
        };

        let preserved = self.store.preserved()?;
        if preserved
            .latest_compact()
            .is_some_and(|c| c.content.trim() == summary)
        {
            tracing::debug!("Compaction summary already stored");
            return Ok(CaptureOutcome::Duplicate);
        }

        let note = CompactNote::new(summary, trigger.map(String::from));
        let batch = MemoryBatch {
            compacts: vec![note.clone()],
            ..Default::default()
        };
        let stats = self.store.merge(&batch, &self.limits)?;
        if stats.added == 0 {
            return Ok(CaptureOutcome::Duplicate);
        }
        tracing::info!(chars = note.content.chars().count(), "Captured compaction summary");
        Ok(CaptureOutcome::Captured(note))
    }

    fn find_with_retry(
        &self,
        transcript: &Path,
        mut scan: impl FnMut(&Path) -> Result<Option<String>, CaptureError>,
    ) -> Option<String> {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match scan(transcript) {
                Ok(Some(summary)) => return Some(summary),
                Ok(None) => {}
                Err(e) => tracing::debug!(attempt, "Transcript not readable yet: {e}"),
            }
            if attempt < attempts {
                std::thread::sleep(self.retry.delay);
            }
        }
        None
    }
}
