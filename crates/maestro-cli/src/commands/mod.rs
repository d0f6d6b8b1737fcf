pub mod hook;
pub mod locate;
pub mod memory;
pub mod ralph;
pub mod sync;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Handle a host lifecycle event (reads JSON on stdin, writes JSON on stdout)
    Hook(hook::HookArgs),
    /// Control the forced-iteration loop
    Ralph(ralph::RalphArgs),
    /// Inspect or edit the project memory
    Memory(memory::MemoryArgs),
    /// Sync the active session's transcript into memory now
    Sync,
    /// Show which transcript belongs to this project
    Locate,
}
