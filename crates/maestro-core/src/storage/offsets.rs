use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::storage::atomic::write_atomic;

/// Upper bound on remembered tool invocations awaiting their result.
pub const PENDING_TOOLS_MAX: usize = 256;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SyncState {
    #[serde(default)]
    offsets: BTreeMap<String, u64>,
    /// `(tool_use id, tool name)` pairs whose result has not been read yet,
    /// oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pending_tools: Vec<(String, String)>,
}

/// Per-file sync checkpoints, persisted as `sync.state`.
///
/// Keys are `<sessionId>:<filename>`, values the byte offset just past the
/// last fully processed line. Entries for sessions that no longer exist are
/// left alone.
///
/// The same file remembers tool invocations whose result line has not been
/// read yet, so a result arriving in a later sync still resolves its tool.
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
    state: SyncState,
    dirty: bool,
}

impl OffsetStore {
    /// Load checkpoints from `path`. A missing or unreadable file yields an
    /// empty store. A bare offsets map is accepted as well.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(data) => parse_state(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Unreadable sync state, starting empty: {e}");
                SyncState::default()
            }),
            Err(_) => SyncState::default(),
        };
        Self {
            path,
            state,
            dirty: false,
        }
    }

    /// Checkpoint key for a file read on behalf of a session.
    pub fn key(session_id: &str, file: &Path) -> String {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{session_id}:{name}")
    }

    pub fn get(&self, key: &str) -> u64 {
        self.state.offsets.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: String, offset: u64) {
        if self.state.offsets.get(&key) != Some(&offset) {
            self.state.offsets.insert(key, offset);
            self.dirty = true;
        }
    }

    /// Tool invocations still waiting for their result, oldest first.
    pub fn pending_tools(&self) -> &[(String, String)] {
        &self.state.pending_tools
    }

    /// Remember a tool invocation until its result is read.
    pub fn remember_tool(&mut self, id: &str, name: &str) {
        let pending = &mut self.state.pending_tools;
        if id.is_empty() || pending.iter().any(|(known, _)| known == id) {
            return;
        }
        pending.push((id.to_string(), name.to_string()));
        if pending.len() > PENDING_TOOLS_MAX {
            let excess = pending.len() - PENDING_TOOLS_MAX;
            pending.drain(..excess);
        }
        self.dirty = true;
    }

    /// Drop a tool invocation once its result has been seen.
    pub fn resolve_tool(&mut self, id: &str) {
        let before = self.state.pending_tools.len();
        self.state.pending_tools.retain(|(known, _)| known != id);
        if self.state.pending_tools.len() != before {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.state.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.offsets.is_empty()
    }

    /// Persist if anything changed since load.
    pub fn save(&mut self) -> Result<(), CoreError> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_vec_pretty(&self.state)?;
        write_atomic(&self.path, &json)?;
        self.dirty = false;
        Ok(())
    }
}

fn parse_state(data: &str) -> Result<SyncState, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.get("offsets").is_some() {
        return serde_json::from_value(value);
    }
    Ok(SyncState {
        offsets: serde_json::from_value(value)?,
        pending_tools: Vec::new(),
    })
}
