use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;

use maestro_core::config::Settings;
use maestro_core::paths::{is_fresh_project, normalize_project_path};

const SESSION_INDEX_FILE: &str = "sessions-index.json";

/// The transcript files belonging to one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
    pub main_transcript: PathBuf,
    /// `<projectDir>/<sessionId>/subagents`; may not exist.
    pub subagent_dir: PathBuf,
}

impl SessionHandle {
    /// Build a handle from a transcript path. The session id defaults to the
    /// file stem.
    pub fn from_transcript(path: &Path, session_id: Option<&str>) -> Option<Self> {
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        let session_id = session_id
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or(stem);
        let project_dir = path.parent()?;
        Some(Self {
            subagent_dir: project_dir.join(&session_id).join("subagents"),
            session_id,
            main_transcript: path.to_path_buf(),
        })
    }

    /// Subagent transcripts, oldest name first.
    pub fn subagent_transcripts(&self, extension: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.subagent_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_extension(p, extension))
            .collect();
        files.sort();
        files
    }
}

/// Result of looking up the active session for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Found(SessionHandle),
    /// The project has no content yet; prior sessions must not be recovered.
    Fresh,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    #[serde(default, rename = "sessionId")]
    pub session_id: String,
    #[serde(default, rename = "fullPath")]
    pub full_path: Option<PathBuf>,
    #[serde(default, rename = "fileMtime")]
    pub file_mtime: u64,
}

#[derive(Debug, Default, Deserialize)]
struct SessionIndex {
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

/// One per-project directory under the transcripts root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirSnapshot {
    pub name: String,
    pub path: PathBuf,
    pub transcripts: Vec<TranscriptFile>,
    pub index: Vec<IndexEntry>,
}

/// Point-in-time view of the host's transcripts directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptsSnapshot {
    pub projects: Vec<ProjectDirSnapshot>,
    pub extension: String,
}

impl TranscriptsSnapshot {
    /// Scan `root`. A missing root gives an empty snapshot.
    pub fn capture(root: &Path, extension: &str) -> Self {
        let mut projects = Vec::new();
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                projects.push(ProjectDirSnapshot {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    transcripts: scan_transcripts(&path, extension),
                    index: read_index(&path),
                    path,
                });
            }
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            projects,
            extension: extension.to_string(),
        }
    }

    /// Find the host's directory for a project: exact case-insensitive
    /// match first, then a case-insensitive prefix match in either direction
    /// (longest name wins).
    pub fn project_dir(&self, project_root: &Path) -> Option<&ProjectDirSnapshot> {
        let wanted = normalize_project_path(project_root).to_lowercase();
        let wanted = wanted.trim_end_matches('-');

        if let Some(exact) = self
            .projects
            .iter()
            .find(|p| p.name.to_lowercase().trim_end_matches('-') == wanted)
        {
            return Some(exact);
        }
        self.projects
            .iter()
            .filter(|p| {
                let name = p.name.to_lowercase();
                let name = name.trim_end_matches('-');
                !name.is_empty() && (name.starts_with(wanted) || wanted.starts_with(name))
            })
            .max_by_key(|p| p.name.len())
    }
}

/// Pick the active session for `project_root` from a snapshot.
pub fn locate_session(project_root: &Path, snapshot: &TranscriptsSnapshot) -> Option<SessionHandle> {
    let project = snapshot.project_dir(project_root)?;

    if let Some(newest) = project.transcripts.iter().max_by_key(|t| t.modified) {
        return SessionHandle::from_transcript(&newest.path, None);
    }

    let entry = project
        .index
        .iter()
        .filter(|e| !e.session_id.is_empty())
        .max_by_key(|e| e.file_mtime)?;
    let path = entry.full_path.clone().unwrap_or_else(|| {
        project
            .path
            .join(format!("{}.{}", entry.session_id, snapshot.extension))
    });
    SessionHandle::from_transcript(&path, Some(&entry.session_id))
}

/// Filesystem-backed lookup: fresh-start check, snapshot, locate.
pub fn discover_session(settings: &Settings) -> SessionLookup {
    if is_fresh_project(&settings.project_root) {
        tracing::debug!(root = %settings.project_root.display(), "Fresh project, skipping session lookup");
        return SessionLookup::Fresh;
    }
    let snapshot =
        TranscriptsSnapshot::capture(&settings.transcripts_root, &settings.transcript_extension);
    match locate_session(&settings.project_root, &snapshot) {
        Some(handle) => SessionLookup::Found(handle),
        None => SessionLookup::NotFound,
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn scan_transcripts(dir: &Path, extension: &str) -> Vec<TranscriptFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if !has_extension(&path, extension) {
                return None;
            }
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some(TranscriptFile {
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            })
        })
        .collect()
}

fn read_index(dir: &Path) -> Vec<IndexEntry> {
    let Ok(data) = std::fs::read_to_string(dir.join(SESSION_INDEX_FILE)) else {
        return Vec::new();
    };
    match serde_json::from_str::<SessionIndex>(&data) {
        Ok(index) => index.entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), "Unreadable session index: {e}");
            Vec::new()
        }
    }
}
