//! Turns transcript records into memory facts.
//!
//! Classification is best-effort: records that match no rule are ignored.

pub mod rules;
pub mod signals;

use std::collections::HashMap;
use std::path::Path;

use maestro_core::model::{
    CompactNote, ContentBlock, ErrorNote, MemoryBatch, Note, TranscriptRecord,
};

use rules::{BlockContext, RULES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFact {
    pub text: String,
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionFact {
    Decision(String),
    /// A compaction summary found in the normal record stream.
    AutoSummary(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub content: String,
    pub status: TaskStatus,
}

/// A full task list as written by the assistant's task tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub items: Vec<TaskItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Edit,
    Create,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Edit => "edit",
            FileAction::Create => "create",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeFact {
    /// Relative to the project root when inside it.
    pub path: String,
    pub action: FileAction,
    pub description: String,
}

/// Facts collected from a batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub errors: Vec<ErrorFact>,
    pub decisions: Vec<DecisionFact>,
    pub tasks: Vec<TaskSnapshot>,
    pub file_changes: Vec<FileChangeFact>,
}

impl Harvest {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
            && self.decisions.is_empty()
            && self.tasks.is_empty()
            && self.file_changes.is_empty()
    }

    /// Route facts into memory categories.
    ///
    /// Only the latest task snapshot counts: its completed items become
    /// `completed`, the rest `goal`. File changes are not persisted.
    pub fn to_batch(&self) -> MemoryBatch {
        let mut batch = MemoryBatch::default();
        for error in &self.errors {
            batch
                .errors
                .push(ErrorNote::new(error.text.clone(), Some(error.tool.clone())));
        }
        for decision in &self.decisions {
            match decision {
                DecisionFact::Decision(text) => batch.decisions.push(Note::auto(text.clone())),
                DecisionFact::AutoSummary(text) => {
                    batch.compacts.push(CompactNote::new(text.clone(), None))
                }
            }
        }
        if let Some(snapshot) = self.tasks.last() {
            for item in &snapshot.items {
                let note = Note::auto(item.content.clone());
                match item.status {
                    TaskStatus::Completed => batch.completed.push(note),
                    TaskStatus::Pending | TaskStatus::InProgress => batch.goals.push(note),
                }
            }
        }
        batch
    }
}

/// Maps tool-call ids to tool names so results can be attributed.
#[derive(Debug, Clone, Default)]
pub struct ToolNames(HashMap<String, String>);

impl ToolNames {
    pub fn observe(&mut self, record: &TranscriptRecord) {
        for block in record.blocks() {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                if !id.is_empty() {
                    self.0.insert(id, name);
                }
            }
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.0.insert(id.into(), name.into());
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TranscriptRecord>) -> Self {
        let mut names = Self::default();
        for record in records {
            names.observe(record);
        }
        names
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct Classifier<'a> {
    tools: &'a ToolNames,
    project_root: &'a Path,
}

impl<'a> Classifier<'a> {
    pub fn new(tools: &'a ToolNames, project_root: &'a Path) -> Self {
        Self {
            tools,
            project_root,
        }
    }

    /// Classify one record into `harvest`.
    pub fn classify(&self, record: &TranscriptRecord, harvest: &mut Harvest) {
        // The host's own flag is authoritative over the text heuristic.
        if record.is_flagged_summary() {
            let text = record.text();
            if !text.trim().is_empty() {
                harvest
                    .decisions
                    .push(DecisionFact::AutoSummary(text.trim().to_string()));
            }
        }

        for block in record.blocks() {
            let ctx = BlockContext {
                record,
                block: &block,
                tools: self.tools,
                project_root: self.project_root,
            };
            for rule in RULES {
                if (rule.applies)(&ctx) {
                    tracing::trace!(rule = rule.name, "Rule matched");
                    (rule.extract)(&ctx, harvest);
                }
            }
        }
    }

    pub fn classify_all<'r>(&self, records: impl IntoIterator<Item = &'r TranscriptRecord>) -> Harvest {
        let mut harvest = Harvest::default();
        for record in records {
            self.classify(record, &mut harvest);
        }
        harvest
    }
}
