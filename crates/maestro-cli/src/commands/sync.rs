use anyhow::{bail, Context, Result};

use maestro_capture::session::{discover_session, SessionLookup};
use maestro_capture::sync::SyncPipeline;

use crate::context::ProjectOpts;
use crate::output::{format, OutputFormat};

pub fn run(opts: &ProjectOpts, fmt: OutputFormat) -> Result<()> {
    let settings = opts.settings(None)?;
    let session = match discover_session(&settings) {
        SessionLookup::Found(handle) => handle,
        SessionLookup::Fresh => bail!("Fresh project: there is no earlier session to sync"),
        SessionLookup::NotFound => bail!(
            "No transcript found for {} under {}",
            settings.project_root.display(),
            settings.transcripts_root.display()
        ),
    };

    let report = SyncPipeline::new(&settings)
        .run(&session)
        .with_context(|| format!("Failed to sync session {}", session.session_id))?;
    println!("{}", format::format_sync_report(&report, fmt).trim_end());
    Ok(())
}
