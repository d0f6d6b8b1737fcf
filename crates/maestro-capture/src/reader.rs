//! Incremental, checkpointed reading of append-only transcript files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use maestro_core::model::TranscriptRecord;
use maestro_core::storage::OffsetStore;

use crate::error::CaptureError;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// What one incremental read saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Offset reading started from.
    pub start: u64,
    /// New checkpoint: just past the last complete line.
    pub end: u64,
    pub records: usize,
    /// Complete lines that were not valid records.
    pub skipped: usize,
    /// The file was shorter than its checkpoint and was re-read from 0.
    pub rotated: bool,
}

/// Reads records appended since the last checkpoint.
///
/// Only newline-terminated lines are consumed; a trailing partial line stays
/// unread until the host finishes writing it.
#[derive(Debug, Clone)]
pub struct IncrementalReader {
    chunk_size: usize,
}

impl Default for IncrementalReader {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl IncrementalReader {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read new records from `path`, advancing its checkpoint in `offsets`.
    ///
    /// The checkpoint is only updated in memory; the caller saves `offsets`
    /// after the records have been merged. A missing file is not an error.
    pub fn read_new(
        &self,
        path: &Path,
        session_id: &str,
        offsets: &mut OffsetStore,
        mut on_record: impl FnMut(TranscriptRecord),
    ) -> Result<ReadOutcome, CaptureError> {
        let key = OffsetStore::key(session_id, path);
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ReadOutcome::default());
            }
            Err(e) => return Err(e.into()),
        };

        let stored = offsets.get(&key);
        let mut outcome = ReadOutcome {
            start: stored,
            end: stored,
            ..Default::default()
        };
        if size < stored {
            tracing::debug!(path = %path.display(), stored, size, "Transcript shrank, rereading");
            outcome.rotated = true;
            outcome.start = 0;
            outcome.end = 0;
        }
        if outcome.start >= size {
            offsets.set(key, outcome.end);
            return Ok(outcome);
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(outcome.start))?;
        // Never read past the size observed above.
        let mut input = file.take(size - outcome.start);

        let mut buf = vec![0u8; self.chunk_size];
        let mut pending: Vec<u8> = Vec::new();
        let mut consumed: u64 = 0;

        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let scan_from = pending.len();
            pending.extend_from_slice(&buf[..n]);

            let mut line_start = 0;
            for i in scan_from..pending.len() {
                if pending[i] == b'\n' {
                    decode_line(&pending[line_start..i], &mut outcome, &mut on_record);
                    line_start = i + 1;
                }
            }
            pending.drain(..line_start);
            consumed += line_start as u64;
        }

        outcome.end = outcome.start + consumed;
        offsets.set(key, outcome.end);
        tracing::debug!(
            path = %path.display(),
            start = outcome.start,
            end = outcome.end,
            records = outcome.records,
            skipped = outcome.skipped,
            "Read transcript increment"
        );
        Ok(outcome)
    }
}

fn decode_line(
    line: &[u8],
    outcome: &mut ReadOutcome,
    on_record: &mut impl FnMut(TranscriptRecord),
) {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    match serde_json::from_slice::<TranscriptRecord>(line) {
        Ok(record) => {
            outcome.records += 1;
            on_record(record);
        }
        Err(e) => {
            outcome.skipped += 1;
            tracing::debug!("Skipping unparseable transcript line: {e}");
        }
    }
}
