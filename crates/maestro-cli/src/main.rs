use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod context;
mod host;
mod output;

use commands::Commands;

#[derive(Parser)]
#[command(
    name = "maestro",
    version,
    about = "Session memory and iteration control for coding-assistant lifecycle hooks"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Write hook diagnostics to the debug log
    #[arg(
        long,
        global = true,
        env = "MAESTRO_DEBUG",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    debug: bool,

    /// Debug log location [default: <data dir>/maestro/hook_debug.log]
    #[arg(long, global = true, env = "MAESTRO_DEBUG_LOG", hide = true)]
    debug_log: Option<PathBuf>,

    #[command(flatten)]
    project: context::ProjectOpts,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Hooks must keep stdout and stderr clean for the host, so diagnostics only
/// go to a side-channel file, and only when asked for.
fn init_hook_tracing(debug: bool, log_path: Option<PathBuf>) {
    if !debug {
        return;
    }
    let Some(path) = log_path.or_else(|| {
        dirs::data_local_dir().map(|d| d.join("maestro").join("hook_debug.log"))
    }) else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    else {
        return;
    };
    fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

/// Whether the process was started as `maestro hook`, judged from the raw
/// arguments because parsing them may have failed.
fn invoked_as_hook() -> bool {
    std::env::args_os().skip(1).any(|arg| arg == "hook")
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if invoked_as_hook() && e.use_stderr() => {
            // The host expects one JSON object and a zero exit, whatever the
            // environment looks like.
            println!("{}", host::HookOutput::empty().to_json());
            return Ok(());
        }
        Err(e) => e.exit(),
    };
    match &cli.command {
        Commands::Hook(_) => init_hook_tracing(cli.debug, cli.debug_log.clone()),
        _ => init_tracing(cli.verbose),
    }

    match &cli.command {
        Commands::Hook(args) => {
            commands::hook::run(args, &cli.project);
            Ok(())
        }
        Commands::Ralph(args) => commands::ralph::run(args, &cli.project, cli.format),
        Commands::Memory(args) => commands::memory::run(args, &cli.project, cli.format),
        Commands::Sync => commands::sync::run(&cli.project, cli.format),
        Commands::Locate => commands::locate::run(&cli.project, cli.format),
    }
}
