use std::path::PathBuf;

use maestro_core::config::Settings;
use maestro_core::model::{ContentBlock, TranscriptRecord};
use maestro_core::storage::{MemoryStore, MergeStats, OffsetStore};

use crate::classify::{Classifier, FileChangeFact, Harvest, ToolNames};
use crate::error::CaptureError;
use crate::reader::IncrementalReader;
use crate::session::SessionHandle;

/// What one sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub files: Vec<PathBuf>,
    pub records: usize,
    pub skipped: usize,
    pub errors: usize,
    pub decisions: usize,
    pub merge: MergeStats,
    /// Reported only; never written to the memory store.
    pub file_changes: Vec<FileChangeFact>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.records == 0
    }
}

/// Read new transcript records, classify them, merge into the memory store
/// and advance the checkpoints.
pub struct SyncPipeline<'a> {
    settings: &'a Settings,
    reader: IncrementalReader,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            reader: IncrementalReader::default(),
        }
    }

    pub fn with_reader(mut self, reader: IncrementalReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn run(&self, session: &SessionHandle) -> Result<SyncReport, CaptureError> {
        let mut offsets = OffsetStore::load(self.settings.sync_state_path());
        let mut report = SyncReport::default();
        let mut records: Vec<TranscriptRecord> = Vec::new();

        let mut files = vec![session.main_transcript.clone()];
        files.extend(session.subagent_transcripts(&self.settings.transcript_extension));

        for file in &files {
            let outcome =
                self.reader
                    .read_new(file, &session.session_id, &mut offsets, |r| records.push(r))?;
            if outcome.records > 0 || outcome.skipped > 0 {
                report.files.push(file.clone());
            }
            report.records += outcome.records;
            report.skipped += outcome.skipped;
        }

        if !records.is_empty() {
            let tools = resolve_tool_names(&mut offsets, &records);
            let harvest: Harvest =
                Classifier::new(&tools, &self.settings.project_root).classify_all(&records);
            report.errors = harvest.errors.len();
            report.decisions = harvest.decisions.len();

            let store = MemoryStore::new(self.settings.brain_path());
            report.merge = store.merge(&harvest.to_batch(), &self.settings.retention)?;
            report.file_changes = harvest.file_changes;
        }

        // Checkpoints move only after the merge landed.
        offsets.save()?;
        tracing::debug!(
            session = %session.session_id,
            records = report.records,
            added = report.merge.added,
            "Sync finished"
        );
        Ok(report)
    }
}

/// Tool names for `records`, including invocations read by an earlier sync
/// whose results only show up now. Invocations still without a result are
/// carried forward in the sync state.
fn resolve_tool_names(offsets: &mut OffsetStore, records: &[TranscriptRecord]) -> ToolNames {
    let mut tools = ToolNames::default();
    for (id, name) in offsets.pending_tools() {
        tools.insert(id.as_str(), name.as_str());
    }
    for record in records {
        tools.observe(record);
    }

    for block in records.iter().flat_map(TranscriptRecord::blocks) {
        match block {
            ContentBlock::ToolUse { id, name, .. } => offsets.remember_tool(&id, &name),
            ContentBlock::ToolResult { tool_use_id, .. } => offsets.resolve_tool(&tool_use_id),
            _ => {}
        }
    }
    tools
}
