use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use maestro_core::model::IterationMode;
use maestro_core::ralph::{FileIterationPort, IterationController};

use crate::context::ProjectOpts;
use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct RalphArgs {
    #[command(subcommand)]
    pub action: RalphAction,
}

#[derive(Subcommand)]
pub enum RalphAction {
    /// Start a loop: every stop is refused until the budget is spent
    Init {
        /// Number of refused stops before the loop ends on its own
        #[arg(long, default_value_t = 10)]
        max: u32,

        /// Focus of each iteration (quality, features, tests, polish)
        #[arg(long, default_value = "quality")]
        mode: IterationMode,

        /// Feature to work on (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,
    },
    /// Signal that the work is done; the next stop ends the loop
    Complete,
    /// Show the loop state
    Status,
    /// End the loop immediately
    Cancel,
}

pub fn run(args: &RalphArgs, opts: &ProjectOpts, fmt: OutputFormat) -> Result<()> {
    let settings = opts.settings(None)?;
    let controller = IterationController::new(FileIterationPort::new(settings.meta_dir()));

    match &args.action {
        RalphAction::Init {
            max,
            mode,
            features,
        } => {
            let state = controller
                .init(*max, *mode, features.clone())
                .context("Failed to start the iteration loop")?;
            println!(
                "Iteration loop started: up to {} iterations in {} mode.",
                state.max, state.mode
            );
            println!("Run `maestro ralph complete` once the work is done.");
        }
        RalphAction::Complete => {
            controller
                .complete()
                .context("Failed to signal completion")?;
            println!("Completion signaled; the next stop ends the loop.");
        }
        RalphAction::Status => {
            let state = controller.status().context("Failed to read loop state")?;
            println!("{}", format::format_gate_state(&state, fmt).trim_end());
        }
        RalphAction::Cancel => {
            controller.cancel().context("Failed to cancel the loop")?;
            println!("Iteration loop cancelled.");
        }
    }
    Ok(())
}
