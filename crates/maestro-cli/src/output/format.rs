use serde_json::json;

use maestro_capture::session::SessionHandle;
use maestro_capture::sync::SyncReport;
use maestro_core::model::MemoryEntry;
use maestro_core::ralph::GateState;
use maestro_core::storage::Preserved;
use maestro_core::text::truncate_chars;

use super::OutputFormat;

const LINE_MAX_CHARS: usize = 160;

pub fn format_memory(memory: &Preserved, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = memory
                .clone()
                .into_entries()
                .iter()
                .filter_map(|e| e.to_line().ok())
                .filter_map(|line| serde_json::from_str(&line).ok())
                .collect();
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        }
        OutputFormat::Text => format_memory_text(memory),
    }
}

fn format_memory_text(memory: &Preserved) -> String {
    if memory.is_empty() {
        return "Memory is empty.".to_string();
    }
    let mut out = String::new();
    for entry in &memory.tech {
        if let MemoryEntry::Tech { category, value } = entry {
            let mut value = value.clone();
            if let Some(obj) = value.as_object_mut() {
                obj.remove("type");
            }
            out.push_str(&format!("{}: {value}\n", category.tag()));
        }
    }

    let mut list = |title: &str, items: Vec<String>| {
        if items.is_empty() {
            return;
        }
        out.push_str(&format!("\n{title} ({})\n", items.len()));
        for item in items {
            out.push_str(&format!("  - {}\n", truncate_chars(&item, LINE_MAX_CHARS)));
        }
    };
    list(
        "Compaction summaries",
        memory
            .compacts
            .iter()
            .map(|c| format!("{} {}", c.timestamp.format("%Y-%m-%d %H:%M"), c.content.replace('\n', " ")))
            .collect(),
    );
    list("Goals", memory.goals.iter().map(|n| n.content.clone()).collect());
    list("Decisions", memory.decisions.iter().map(|n| n.content.clone()).collect());
    list("Completed", memory.completed.iter().map(|n| n.content.clone()).collect());
    list(
        "Errors",
        memory
            .errors
            .iter()
            .map(|e| format!("[{}] {}", e.tool.as_deref().unwrap_or("?"), e.content))
            .collect(),
    );
    if !memory.others.is_empty() {
        out.push_str(&format!("\nOther entries: {}\n", memory.others.len()));
    }
    out
}

pub fn format_gate_state(state: &GateState, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let value = match state {
                GateState::Inactive => json!({"status": "inactive"}),
                GateState::Orphaned => json!({"status": "orphaned"}),
                GateState::Active(s) => json!({"status": "active", "state": s}),
                GateState::CompletionSignaled(s) => json!({"status": "completion_signaled", "state": s}),
            };
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        OutputFormat::Text => match state {
            GateState::Inactive => "Iteration loop inactive.".to_string(),
            GateState::Orphaned => {
                "Iteration loop marked active but its state is unreadable; the next stop will clean it up.".to_string()
            }
            GateState::Active(s) | GateState::CompletionSignaled(s) => {
                let mut out = format!(
                    "Iteration {}/{} ({} mode), started {}\n",
                    s.current,
                    s.max,
                    s.mode,
                    s.started_at.format("%Y-%m-%d %H:%M")
                );
                if !s.features.is_empty() {
                    out.push_str(&format!("Features: {}\n", s.features.join(", ")));
                }
                if matches!(state, GateState::CompletionSignaled(_)) {
                    out.push_str("Completion signaled: the next stop ends the loop.\n");
                }
                out
            }
        },
    }
}

pub fn format_sync_report(report: &SyncReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let value = json!({
                "files": report.files,
                "records": report.records,
                "skipped": report.skipped,
                "errors": report.errors,
                "decisions": report.decisions,
                "added": report.merge.added,
                "duplicates": report.merge.duplicates,
                "evicted": report.merge.evicted,
                "fileChanges": report.file_changes.iter().map(|c| json!({
                    "path": c.path,
                    "action": c.action.as_str(),
                    "description": c.description,
                })).collect::<Vec<_>>(),
            });
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        OutputFormat::Text => {
            if report.is_noop() {
                return "Nothing new to sync.".to_string();
            }
            let mut out = format!(
                "Read {} records from {} file(s) ({} skipped)\n",
                report.records,
                report.files.len(),
                report.skipped
            );
            out.push_str(&format!(
                "Found {} errors, {} decisions; {} added, {} duplicates, {} evicted\n",
                report.errors,
                report.decisions,
                report.merge.added,
                report.merge.duplicates,
                report.merge.evicted
            ));
            for change in &report.file_changes {
                out.push_str(&format!(
                    "  {} {} ({})\n",
                    change.action.as_str(),
                    change.path,
                    change.description
                ));
            }
            out
        }
    }
}

pub fn format_session(handle: &SessionHandle, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "sessionId": handle.session_id,
            "transcript": handle.main_transcript,
            "subagentDir": handle.subagent_dir,
        }))
        .unwrap_or_default(),
        OutputFormat::Text => format!(
            "Session:    {}\nTranscript: {}\nSubagents:  {}\n",
            handle.session_id,
            handle.main_transcript.display(),
            handle.subagent_dir.display()
        ),
    }
}

