use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::paths;

const PROJECT_CONFIG_FILE: &str = "config.json";
const DEFAULT_CAPTURE_ATTEMPTS: u32 = 3;
const DEFAULT_CAPTURE_DELAY_MS: u64 = 500;

/// Per-category caps applied on every memory store rewrite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionLimits {
    pub compacts: usize,
    pub goals: usize,
    pub decisions: usize,
    pub completed: usize,
    pub errors: usize,
}

impl Default for RetentionLimits {
    fn default() -> Self {
        Self {
            compacts: 10,
            goals: 20,
            decisions: 30,
            completed: 30,
            errors: 20,
        }
    }
}

/// How hard the compaction capturer tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CAPTURE_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_CAPTURE_DELAY_MS),
        }
    }
}

/// Optional `.maestro/config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectConfig {
    #[serde(default)]
    retention: RetentionLimits,
}

/// Resolved settings for one hook invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_root: PathBuf,
    pub transcripts_root: PathBuf,
    pub transcript_extension: String,
    pub retention: RetentionLimits,
    pub capture_retry: RetryPolicy,
}

impl Settings {
    /// Settings with built-in defaults for a project.
    pub fn new(project_root: impl Into<PathBuf>, transcripts_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            transcripts_root: transcripts_root.into(),
            transcript_extension: "jsonl".to_string(),
            retention: RetentionLimits::default(),
            capture_retry: RetryPolicy::default(),
        }
    }

    /// Defaults overlaid with the project's `.maestro/config.json`, if any.
    ///
    /// An unreadable config file is logged and ignored.
    pub fn load(project_root: impl Into<PathBuf>, transcripts_root: impl Into<PathBuf>) -> Self {
        let mut settings = Self::new(project_root, transcripts_root);
        match read_project_config(&settings.meta_dir()) {
            Ok(Some(cfg)) => settings.retention = cfg.retention,
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring project config: {e}"),
        }
        settings
    }

    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_retry.delay = delay;
        self
    }

    /// `<project_root>/.maestro`
    pub fn meta_dir(&self) -> PathBuf {
        paths::meta_dir(&self.project_root)
    }

    pub fn brain_path(&self) -> PathBuf {
        self.meta_dir().join(paths::BRAIN_FILE)
    }

    pub fn sync_state_path(&self) -> PathBuf {
        self.meta_dir().join(paths::SYNC_STATE_FILE)
    }
}

/// Default host transcripts directory: `~/.claude/projects`.
pub fn default_transcripts_root() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join("projects"))
}

fn read_project_config(meta_dir: &Path) -> Result<Option<ProjectConfig>, CoreError> {
    let path = meta_dir.join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)?;
    let cfg = serde_json::from_str(&data)
        .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
    Ok(Some(cfg))
}
