use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use maestro_core::config::{default_transcripts_root, Settings};
use maestro_core::paths::resolve_project_root;

/// Where the project and the host's transcripts live.
#[derive(Args, Debug, Clone)]
pub struct ProjectOpts {
    /// Project root (defaults to the nearest directory with a root marker)
    #[arg(long, global = true, env = "CLAUDE_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Host transcripts directory [default: ~/.claude/projects]
    #[arg(long, global = true, env = "MAESTRO_TRANSCRIPTS_DIR")]
    pub transcripts_dir: Option<PathBuf>,

    /// Delay between compaction capture attempts, in milliseconds
    #[arg(long, global = true, env = "MAESTRO_CAPTURE_DELAY_MS", hide = true)]
    pub capture_delay_ms: Option<u64>,
}

impl ProjectOpts {
    /// Resolve settings. `host_cwd` is the working directory reported by the
    /// host, used when no project directory was given explicitly.
    pub fn settings(&self, host_cwd: Option<&Path>) -> Result<Settings> {
        let start = std::env::current_dir().context("Cannot read current directory")?;
        let explicit = self.project_dir.as_deref().or(host_cwd);
        let root = resolve_project_root(explicit, &start);

        let transcripts = match &self.transcripts_dir {
            Some(dir) => dir.clone(),
            None => default_transcripts_root().context("Cannot locate home directory")?,
        };

        let mut settings = Settings::load(root, transcripts);
        if let Some(ms) = self.capture_delay_ms {
            settings = settings.with_capture_delay(Duration::from_millis(ms));
        }
        tracing::debug!(
            root = %settings.project_root.display(),
            transcripts = %settings.transcripts_root.display(),
            "Resolved settings"
        );
        Ok(settings)
    }
}
