//! Markdown digest of the memory store, injected at session start.

use std::fmt::Write as _;

use maestro_core::model::MemoryCategory;
use maestro_core::storage::Preserved;
use maestro_core::text::truncate_chars;

use crate::classify::FileChangeFact;

const SUMMARY_MAX_CHARS: usize = 2000;
const TECH_MAX_CHARS: usize = 300;
const RECENT_DECISIONS: usize = 10;
const RECENT_ERRORS: usize = 5;
const RECENT_COMPLETED: usize = 5;
const RECENT_FILES: usize = 15;

/// Render the digest, or `None` when there is nothing worth saying.
pub fn render_digest(memory: &Preserved, changes: &[FileChangeFact]) -> Option<String> {
    if memory.is_empty() && changes.is_empty() {
        return None;
    }
    let mut out = String::from("# Project memory (maestro)\n");

    let tech: Vec<_> = [
        MemoryCategory::TechStack,
        MemoryCategory::Architecture,
        MemoryCategory::Scripts,
    ]
    .into_iter()
    .filter_map(|c| memory.tech_value(c).map(|v| (c, v)))
    .collect();
    if !tech.is_empty() {
        out.push_str("\n## Project\n");
        for (category, value) in tech {
            let mut value = value.clone();
            if let Some(obj) = value.as_object_mut() {
                obj.remove("type");
            }
            let _ = writeln!(
                out,
                "- {}: {}",
                category.tag(),
                truncate_chars(&value.to_string(), TECH_MAX_CHARS)
            );
        }
    }

    if let Some(compact) = memory.latest_compact() {
        let _ = writeln!(
            out,
            "\n## Last session summary ({})\n{}",
            compact.timestamp.format("%Y-%m-%d %H:%M"),
            truncate_chars(compact.content.trim(), SUMMARY_MAX_CHARS)
        );
    }

    section(&mut out, "Open goals", memory.goals.iter().map(|n| n.content.as_str()), usize::MAX);
    section(
        &mut out,
        "Recent decisions",
        memory.decisions.iter().map(|n| n.content.as_str()),
        RECENT_DECISIONS,
    );
    section(
        &mut out,
        "Recently completed",
        memory.completed.iter().map(|n| n.content.as_str()),
        RECENT_COMPLETED,
    );
    let errors: Vec<String> = memory
        .errors
        .iter()
        .map(|e| match &e.tool {
            Some(tool) => format!("[{tool}] {}", e.content),
            None => e.content.clone(),
        })
        .collect();
    section(&mut out, "Recent errors", errors.iter().map(String::as_str), RECENT_ERRORS);

    let files: Vec<String> = changes
        .iter()
        .map(|c| format!("`{}` ({}): {}", c.path, c.action.as_str(), c.description))
        .collect();
    section(&mut out, "Files touched since last sync", files.iter().map(String::as_str), RECENT_FILES);

    Some(out)
}

/// Append a bullet section holding the newest `limit` items, oldest first.
fn section<'a>(
    out: &mut String,
    title: &str,
    items: impl ExactSizeIterator<Item = &'a str>,
    limit: usize,
) {
    let len = items.len();
    if len == 0 {
        return;
    }
    let _ = writeln!(out, "\n## {title}");
    for item in items.skip(len.saturating_sub(limit)) {
        let _ = writeln!(out, "- {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FileAction;
    use maestro_core::model::{CompactNote, ErrorNote, MemoryEntry, Note};

    #[test]
    fn test_empty_memory_has_no_digest() {
        assert_eq!(render_digest(&Preserved::default(), &[]), None);
    }

    #[test]
    fn test_digest_sections() {
        let mut memory = Preserved::default();
        memory.tech.push(MemoryEntry::Tech {
            category: MemoryCategory::TechStack,
            value: serde_json::json!({"type": "tech_stack", "language": "rust"}),
        });
        memory.compacts.push(CompactNote::new("We built the parser.", Some("auto".into())));
        memory.goals.push(Note::auto("Ship v1"));
        memory.errors.push(ErrorNote::new("error: linker failed", Some("Bash".into())));
        for i in 0..12 {
            memory.decisions.push(Note::auto(format!("decision {i}")));
        }
        let changes = vec![FileChangeFact {
            path: "src/lib.rs".into(),
            action: FileAction::Edit,
            description: "2 edits".into(),
        }];

        let digest = render_digest(&memory, &changes).unwrap();
        assert!(digest.contains(r#"- tech_stack: {"language":"rust"}"#));
        assert!(digest.contains("We built the parser."));
        assert!(digest.contains("- Ship v1"));
        assert!(digest.contains("- [Bash] error: linker failed"));
        assert!(digest.contains("`src/lib.rs` (edit): 2 edits"));
        // only the ten most recent decisions
        assert!(!digest.contains("decision 1\n"));
        assert!(digest.contains("decision 2\n"));
        assert!(digest.contains("decision 11\n"));
    }
}
