use anyhow::Result;

use maestro_capture::session::{discover_session, SessionLookup};

use crate::context::ProjectOpts;
use crate::output::{format, OutputFormat};

pub fn run(opts: &ProjectOpts, fmt: OutputFormat) -> Result<()> {
    let settings = opts.settings(None)?;
    match discover_session(&settings) {
        SessionLookup::Found(handle) => {
            println!("{}", format::format_session(&handle, fmt).trim_end());
        }
        SessionLookup::Fresh => println!("Fresh project: earlier sessions are ignored."),
        SessionLookup::NotFound => println!(
            "No transcript found for {} under {}",
            settings.project_root.display(),
            settings.transcripts_root.display()
        ),
    }
    Ok(())
}
