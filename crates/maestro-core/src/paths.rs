//! Project root discovery and the host's project-folder naming scheme.

use std::path::{Path, PathBuf};

pub const META_DIR: &str = ".maestro";
pub const BRAIN_FILE: &str = "brain.jsonl";
pub const SYNC_STATE_FILE: &str = "sync.state";
pub const RALPH_STATE_FILE: &str = "ralph.state";
pub const RALPH_ACTIVE_FILE: &str = "ralph.active";
pub const RALPH_COMPLETE_FILE: &str = "ralph.complete";
pub const RALPH_LOCK_FILE: &str = "ralph.lock";

/// Entries whose presence marks a project root.
const ROOT_MARKERS: &[&str] = &[
    ".git",
    ".hg",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    META_DIR,
];

/// Directories that do not count as project content for fresh-start detection.
const META_ENTRIES: &[&str] = &[".git", ".hg", ".svn", META_DIR, ".claude", ".idea", ".vscode"];

/// Resolve the project root.
///
/// An explicit directory (the host's working directory) wins if it exists.
/// Otherwise walk up from `start` to the first directory containing a root
/// marker, falling back to `start` itself.
pub fn resolve_project_root(explicit: Option<&Path>, start: &Path) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| d.is_dir()) {
        return dir.to_path_buf();
    }

    let mut current = Some(start);
    while let Some(dir) = current {
        if ROOT_MARKERS.iter().any(|m| dir.join(m).exists()) {
            tracing::debug!(root = %dir.display(), "Found project root marker");
            return dir.to_path_buf();
        }
        current = dir.parent();
    }
    start.to_path_buf()
}

/// `<project_root>/.maestro`
pub fn meta_dir(project_root: &Path) -> PathBuf {
    project_root.join(META_DIR)
}

/// Convert a filesystem path into the host's per-project folder name.
///
/// Every character that is not ASCII alphanumeric becomes `-`:
/// `/Users/me/my_app` -> `-Users-me-my-app`, `C:\work\app` -> `C--work-app`.
pub fn normalize_project_path(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// True when the project contains nothing but version-control or meta
/// directories, i.e. there is no prior work to remember.
pub fn is_fresh_project(project_root: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(project_root) else {
        return false;
    };
    entries.flatten().all(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        META_ENTRIES.contains(&name.as_ref())
    })
}
