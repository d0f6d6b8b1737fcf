//! The classification rule table.
//!
//! Each rule is a predicate over one content block plus an extractor that
//! appends facts to the harvest. Every rule is evaluated for every block, so
//! one block may yield several facts.

use std::path::Path;

use serde_json::Value;

use maestro_core::model::{tool_result_text, ContentBlock, TranscriptRecord};
use maestro_core::text::{squash_whitespace, truncate_chars};

use super::signals::{extract_decision, has_failure_signature, is_summary_shaped, EXECUTION_TOOLS};
use super::{
    DecisionFact, ErrorFact, FileAction, FileChangeFact, Harvest, TaskItem, TaskSnapshot,
    TaskStatus, ToolNames,
};

/// Everything a rule may look at.
pub struct BlockContext<'a> {
    pub record: &'a TranscriptRecord,
    pub block: &'a ContentBlock,
    pub tools: &'a ToolNames,
    pub project_root: &'a Path,
}

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&BlockContext<'_>) -> bool,
    pub extract: fn(&BlockContext<'_>, &mut Harvest),
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "flagged_tool_error",
        applies: is_flagged_tool_error,
        extract: extract_tool_error,
    },
    Rule {
        name: "execution_failure",
        applies: is_unflagged_execution_failure,
        extract: extract_tool_error,
    },
    Rule {
        name: "summary_heuristic",
        applies: is_heuristic_summary,
        extract: extract_summary,
    },
    Rule {
        name: "decision",
        applies: is_decision_prose,
        extract: extract_decision_fact,
    },
    Rule {
        name: "task_snapshot",
        applies: is_task_snapshot,
        extract: extract_task_snapshot,
    },
    Rule {
        name: "file_change",
        applies: is_file_change,
        extract: extract_file_change,
    },
];

const TASK_TOOL: &str = "TodoWrite";
const FILE_TOOLS: &[&str] = &["Edit", "MultiEdit", "Write", "NotebookEdit"];
const DESCRIPTION_MAX_CHARS: usize = 80;

fn is_flagged_tool_error(ctx: &BlockContext<'_>) -> bool {
    matches!(
        ctx.block,
        ContentBlock::ToolResult {
            is_error: Some(true),
            ..
        }
    )
}

fn is_unflagged_execution_failure(ctx: &BlockContext<'_>) -> bool {
    let ContentBlock::ToolResult {
        tool_use_id,
        content,
        is_error,
    } = ctx.block
    else {
        return false;
    };
    if *is_error == Some(true) {
        return false;
    }
    let is_execution = ctx
        .tools
        .name(tool_use_id)
        .is_some_and(|name| EXECUTION_TOOLS.contains(&name));
    is_execution && has_failure_signature(&tool_result_text(content))
}

fn extract_tool_error(ctx: &BlockContext<'_>, harvest: &mut Harvest) {
    let ContentBlock::ToolResult {
        tool_use_id,
        content,
        ..
    } = ctx.block
    else {
        return;
    };
    let text = tool_result_text(content);
    if text.trim().is_empty() {
        return;
    }
    harvest.errors.push(ErrorFact {
        text,
        tool: ctx.tools.name(tool_use_id).unwrap_or("unknown").to_string(),
    });
}

fn assistant_text<'a>(ctx: &BlockContext<'a>) -> Option<&'a str> {
    if !ctx.record.is_assistant() || ctx.record.is_flagged_summary() {
        return None;
    }
    match ctx.block {
        ContentBlock::Text { text } => Some(text.as_str()),
        _ => None,
    }
}

fn is_heuristic_summary(ctx: &BlockContext<'_>) -> bool {
    assistant_text(ctx).is_some_and(is_summary_shaped)
}

fn extract_summary(ctx: &BlockContext<'_>, harvest: &mut Harvest) {
    if let Some(text) = assistant_text(ctx) {
        harvest
            .decisions
            .push(DecisionFact::AutoSummary(text.trim().to_string()));
    }
}

fn is_decision_prose(ctx: &BlockContext<'_>) -> bool {
    assistant_text(ctx).is_some_and(|t| !is_summary_shaped(t))
}

fn extract_decision_fact(ctx: &BlockContext<'_>, harvest: &mut Harvest) {
    if let Some(decision) = assistant_text(ctx).and_then(extract_decision) {
        harvest.decisions.push(DecisionFact::Decision(decision));
    }
}

fn tool_use<'a>(ctx: &BlockContext<'a>) -> Option<(&'a str, &'a Value)> {
    match ctx.block {
        ContentBlock::ToolUse { name, input, .. } => Some((name.as_str(), input)),
        _ => None,
    }
}

fn is_task_snapshot(ctx: &BlockContext<'_>) -> bool {
    tool_use(ctx).is_some_and(|(name, _)| name == TASK_TOOL)
}

fn extract_task_snapshot(ctx: &BlockContext<'_>, harvest: &mut Harvest) {
    let Some((_, input)) = tool_use(ctx) else {
        return;
    };
    let Some(todos) = input.get("todos").and_then(Value::as_array) else {
        return;
    };
    let items = todos
        .iter()
        .filter_map(|todo| {
            let content = todo.get("content").and_then(Value::as_str)?.trim();
            if content.is_empty() {
                return None;
            }
            let status = match todo.get("status").and_then(Value::as_str) {
                Some("completed") => TaskStatus::Completed,
                Some("in_progress") => TaskStatus::InProgress,
                _ => TaskStatus::Pending,
            };
            Some(TaskItem {
                content: content.to_string(),
                status,
            })
        })
        .collect();
    harvest.tasks.push(TaskSnapshot { items });
}

fn is_file_change(ctx: &BlockContext<'_>) -> bool {
    tool_use(ctx).is_some_and(|(name, input)| FILE_TOOLS.contains(&name) && target_path(input).is_some())
}

fn target_path(input: &Value) -> Option<&str> {
    input
        .get("file_path")
        .or_else(|| input.get("notebook_path"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
}

fn extract_file_change(ctx: &BlockContext<'_>, harvest: &mut Harvest) {
    let Some((name, input)) = tool_use(ctx) else {
        return;
    };
    let Some(path) = target_path(input) else {
        return;
    };
    let action = if name == "Write" {
        FileAction::Create
    } else {
        FileAction::Edit
    };
    harvest.file_changes.push(FileChangeFact {
        path: relative_to(ctx.project_root, path),
        action,
        description: describe_change(name, input),
    });
}

fn relative_to(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    match p.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().replace('\\', "/"),
        _ => path.to_string(),
    }
}

fn describe_change(tool: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or("");
    let description = match tool {
        "Write" => format!("wrote {} lines", field("content").lines().count()),
        "MultiEdit" => {
            let n = input
                .get("edits")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("{n} edits")
        }
        "NotebookEdit" => {
            let mode = match field("edit_mode") {
                "" => "replace",
                m => m,
            };
            format!("notebook cell {mode}")
        }
        _ => {
            let new = squash_whitespace(field("new_string"));
            if new.is_empty() {
                "removed text".to_string()
            } else {
                format!("edit: {new}")
            }
        }
    };
    truncate_chars(&description, DESCRIPTION_MAX_CHARS)
}
