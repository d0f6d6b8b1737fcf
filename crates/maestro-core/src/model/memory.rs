use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Category tag stored in the `type` field of every `brain.jsonl` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryCategory {
    TechStack,
    Architecture,
    Scripts,
    Compact,
    Goal,
    Decision,
    Completed,
    Error,
    Other,
}

impl MemoryCategory {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TechStack => "tech_stack",
            Self::Architecture => "architecture",
            Self::Scripts => "scripts",
            Self::Compact => "compact",
            Self::Goal => "goal",
            Self::Decision => "decision",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other => "other",
        }
    }

    /// Map a `type` tag to its category. Unknown tags are `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "tech_stack" => Self::TechStack,
            "architecture" => Self::Architecture,
            "scripts" => Self::Scripts,
            "compact" => Self::Compact,
            "goal" => Self::Goal,
            "decision" => Self::Decision,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }

    pub fn is_tech(&self) -> bool {
        matches!(self, Self::TechStack | Self::Architecture | Self::Scripts)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteSource {
    #[default]
    Auto,
    Manual,
}

/// A goal, decision or completed item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: NoteSource,
}

impl Note {
    pub fn auto(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            source: NoteSource::Auto,
        }
    }

    pub fn manual(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            source: NoteSource::Manual,
        }
    }
}

/// A compaction summary captured before the host discarded the history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompactNote {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl CompactNote {
    pub fn new(content: impl Into<String>, trigger: Option<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            trigger,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorNote {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorNote {
    pub fn new(content: impl Into<String>, tool: Option<String>) -> Self {
        Self {
            content: content.into(),
            tool,
            timestamp: Utc::now(),
        }
    }
}

/// One line of the memory store.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEntry {
    /// `tech_stack`, `architecture` or `scripts`; the payload is opaque.
    Tech {
        category: MemoryCategory,
        value: serde_json::Value,
    },
    Compact(CompactNote),
    Goal(Note),
    Decision(Note),
    Completed(Note),
    Error(ErrorNote),
    /// Anything else, kept byte for byte as it was read.
    Other { tag: Option<String>, raw: Vec<u8> },
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    #[serde(rename = "type")]
    tag: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

impl MemoryEntry {
    pub fn category(&self) -> MemoryCategory {
        match self {
            Self::Tech { category, .. } => *category,
            Self::Compact(_) => MemoryCategory::Compact,
            Self::Goal(_) => MemoryCategory::Goal,
            Self::Decision(_) => MemoryCategory::Decision,
            Self::Completed(_) => MemoryCategory::Completed,
            Self::Error(_) => MemoryCategory::Error,
            Self::Other { .. } => MemoryCategory::Other,
        }
    }

    /// Text used for content-based deduplication, if the entry has one.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Compact(n) => Some(&n.content),
            Self::Goal(n) | Self::Decision(n) | Self::Completed(n) => Some(&n.content),
            Self::Error(n) => Some(&n.content),
            Self::Tech { .. } | Self::Other { .. } => None,
        }
    }

    /// Parse one raw store line. Lines that are not UTF-8 are kept as `Other`.
    pub fn parse_bytes(line: &[u8]) -> Self {
        match std::str::from_utf8(line) {
            Ok(text) => Self::parse_line(text),
            Err(_) => Self::Other {
                tag: None,
                raw: line.to_vec(),
            },
        }
    }

    /// Parse one store line. Never fails: lines that cannot be understood as
    /// a known category are kept verbatim as `Other`.
    pub fn parse_line(line: &str) -> Self {
        let other = |tag: Option<String>| Self::Other {
            tag,
            raw: line.as_bytes().to_vec(),
        };

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return other(None),
        };
        let Some(tag) = value.get("type").and_then(|t| t.as_str()).map(String::from) else {
            return other(None);
        };

        let category = MemoryCategory::from_tag(&tag);
        let parsed = match category {
            c if c.is_tech() => Some(Self::Tech {
                category: c,
                value: value.clone(),
            }),
            MemoryCategory::Compact => serde_json::from_value(value).ok().map(Self::Compact),
            MemoryCategory::Goal => serde_json::from_value(value).ok().map(Self::Goal),
            MemoryCategory::Decision => serde_json::from_value(value).ok().map(Self::Decision),
            MemoryCategory::Completed => serde_json::from_value(value).ok().map(Self::Completed),
            MemoryCategory::Error => serde_json::from_value(value).ok().map(Self::Error),
            _ => None,
        };
        parsed.unwrap_or_else(|| other(Some(tag)))
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, CoreError> {
        let line = match self {
            Self::Tech { category, value } => {
                let mut value = value.clone();
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("type".into(), category.tag().into());
                }
                serde_json::to_string(&value)?
            }
            Self::Compact(n) => tagged("compact", n)?,
            Self::Goal(n) => tagged("goal", n)?,
            Self::Decision(n) => tagged("decision", n)?,
            Self::Completed(n) => tagged("completed", n)?,
            Self::Error(n) => tagged("error", n)?,
            Self::Other { raw, .. } => String::from_utf8(raw.clone())
                .map_err(|e| CoreError::InvalidEntry(e.to_string()))?,
        };
        Ok(line)
    }

    /// The exact bytes written to the store for this entry.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        match self {
            Self::Other { raw, .. } => Ok(raw.clone()),
            _ => Ok(self.to_line()?.into_bytes()),
        }
    }
}

fn tagged<T: Serialize>(tag: &'static str, body: &T) -> Result<String, CoreError> {
    Ok(serde_json::to_string(&Tagged { tag, body })?)
}

/// New facts to merge into the memory store in one rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryBatch {
    /// Replacement payloads for single-instance categories.
    pub tech: Vec<(MemoryCategory, serde_json::Value)>,
    pub compacts: Vec<CompactNote>,
    pub goals: Vec<Note>,
    pub decisions: Vec<Note>,
    pub completed: Vec<Note>,
    pub errors: Vec<ErrorNote>,
}

impl MemoryBatch {
    pub fn is_empty(&self) -> bool {
        self.tech.is_empty()
            && self.compacts.is_empty()
            && self.goals.is_empty()
            && self.decisions.is_empty()
            && self.completed.is_empty()
            && self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tech.len()
            + self.compacts.len()
            + self.goals.len()
            + self.decisions.len()
            + self.completed.len()
            + self.errors.len()
    }
}
