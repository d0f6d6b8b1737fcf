use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use clap::Args;

use maestro_capture::{HookContext, LifecycleDispatcher};

use crate::context::ProjectOpts;
use crate::host::{HookInput, HookOutput};

#[derive(Args)]
pub struct HookArgs {
    /// Event name (SessionStart, PreCompact, Stop, ...); read from the payload if omitted
    pub event: Option<String>,
}

/// Always prints exactly one JSON object and never fails.
pub fn run(args: &HookArgs, opts: &ProjectOpts) {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!("Could not read hook payload: {e}");
    }

    let output = catch_unwind(AssertUnwindSafe(|| handle(&raw, args, opts))).unwrap_or_else(|_| {
        tracing::error!("Hook handler panicked");
        HookOutput::empty()
    });
    println!("{}", output.to_json());
}

fn handle(raw: &str, args: &HookArgs, opts: &ProjectOpts) -> HookOutput {
    let input = HookInput::parse(raw);
    let event = input.event(args.event.as_deref());

    let settings = match opts.settings(input.cwd.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Cannot resolve settings: {e:#}");
            return HookOutput::empty();
        }
    };

    let ctx = HookContext {
        event: event.clone(),
        session_id: input.session_id.clone(),
        transcript: input.transcript(),
    };
    match LifecycleDispatcher::new(settings).dispatch(&ctx) {
        Ok(response) => HookOutput::from_response(&event, response),
        Err(e) => {
            tracing::warn!(event = event.name(), "Hook failed: {e}");
            HookOutput::empty()
        }
    }
}
