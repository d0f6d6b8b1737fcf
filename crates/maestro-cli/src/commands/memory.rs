use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use maestro_core::model::{MemoryBatch, MemoryCategory, Note};
use maestro_core::storage::MemoryStore;

use crate::context::ProjectOpts;
use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub action: MemoryAction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NoteKind {
    Goal,
    Decision,
    Completed,
}

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Print the memory store
    Show,
    /// Record a goal, decision or completed item by hand
    Add {
        kind: NoteKind,
        /// The text to remember
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Set one key of the project's tech stack entry
    Tech { key: String, value: String },
}

pub fn run(args: &MemoryArgs, opts: &ProjectOpts, fmt: OutputFormat) -> Result<()> {
    let settings = opts.settings(None)?;
    let store = MemoryStore::new(settings.brain_path());

    match &args.action {
        MemoryAction::Show => {
            let memory = store.preserved().context("Failed to read memory store")?;
            println!("{}", format::format_memory(&memory, fmt).trim_end());
        }
        MemoryAction::Add { kind, text } => {
            let text = text.join(" ");
            let text = text.trim();
            if text.is_empty() {
                bail!("Nothing to add");
            }
            let note = Note::manual(text);
            let mut batch = MemoryBatch::default();
            match kind {
                NoteKind::Goal => batch.goals.push(note),
                NoteKind::Decision => batch.decisions.push(note),
                NoteKind::Completed => batch.completed.push(note),
            }
            let stats = store
                .merge(&batch, &settings.retention)
                .context("Failed to update memory store")?;
            if stats.added == 0 {
                println!("Already recorded.");
            } else {
                println!("Recorded.");
            }
        }
        MemoryAction::Tech { key, value } => {
            let memory = store.preserved().context("Failed to read memory store")?;
            let mut entry = memory
                .tech_value(MemoryCategory::TechStack)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let Some(obj) = entry.as_object_mut() else {
                bail!("Existing tech_stack entry is not an object");
            };
            obj.remove("type");
            obj.insert(key.clone(), serde_json::Value::String(value.clone()));

            let batch = MemoryBatch {
                tech: vec![(MemoryCategory::TechStack, entry)],
                ..Default::default()
            };
            store
                .merge(&batch, &settings.retention)
                .context("Failed to update memory store")?;
            println!("tech_stack.{key} = {value}");
        }
    }
    Ok(())
}
