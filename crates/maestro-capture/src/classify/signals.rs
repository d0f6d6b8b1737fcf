//! Keyword tables and text heuristics used by the classifier rules.

use maestro_core::text::{squash_whitespace, truncate_chars};

/// Tools whose results are shell output.
pub const EXECUTION_TOOLS: &[&str] = &["Bash", "BashOutput", "PowerShell"];

/// Substrings (lowercase) that mark an execution result as a failure even
/// when the host did not flag it.
pub const FAILURE_SIGNATURES: &[&str] = &[
    "command not found",
    "no such file or directory",
    "permission denied",
    "exit code 1",
    "exit code 2",
    "exit code 127",
    "exited with code",
    "non-zero exit",
    "traceback (most recent call last)",
    "error[e",
    "error: ",
    "npm err!",
    "fatal:",
    "panicked at",
    "segmentation fault",
    "build failed",
    "compilation failed",
    "syntaxerror",
    "modulenotfounderror",
    "cannot find module",
];

/// Phrases (lowercase) that mark a sentence as a design decision.
pub const DECISION_INDICATORS: &[&str] = &[
    "decided to",
    "decision:",
    "going with",
    "chose ",
    "opted for",
    "the approach is",
    "approach:",
    "architecture",
    "the plan is",
    "instead of",
    "trade-off",
    "tradeoff",
    "we'll use",
    "we will use",
    "i'll use",
    "will use",
    "rather than",
];

/// Openers (lowercase) of progress narration, which is never a decision.
pub const NARRATION_PREFIXES: &[&str] = &[
    "let me",
    "now i",
    "now let",
    "i'll now",
    "i will now",
    "i'm going to",
    "next, i",
    "first, i",
    "looking at",
    "okay",
    "ok,",
    "great",
    "perfect",
];

/// Phrases (lowercase) that accompany a continuation summary.
pub const CONTINUATION_PHRASES: &[&str] = &[
    "continued from a previous conversation",
    "being continued",
    "previous conversation",
    "ran out of context",
    "context window",
    "conversation so far",
    "pick up where",
];

/// Markers of echoed tool output, which is never a summary.
const TOOL_ECHO_MARKERS: &[&str] = &[
    "<local-command-stdout>",
    "<bash-stdout>",
    "<bash-stderr>",
    "<command-output>",
];

pub const DECISION_MAX_CHARS: usize = 200;
pub const SUMMARY_MIN_CHARS: usize = 400;
const DECISION_MIN_CHARS: usize = 15;

/// Whether shell output carries a failure signature.
pub fn has_failure_signature(text: &str) -> bool {
    let lower = text.to_lowercase();
    FAILURE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// First sentence of assistant prose that reads like a decision.
pub fn extract_decision(text: &str) -> Option<String> {
    sentences(text).into_iter().find_map(|sentence| {
        let sentence = sentence.trim_start_matches(['-', '*', '#', '>', ' ']).trim();
        if sentence.chars().count() < DECISION_MIN_CHARS {
            return None;
        }
        let lower = sentence.to_lowercase();
        if NARRATION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return None;
        }
        if !DECISION_INDICATORS.iter().any(|i| lower.contains(i)) {
            return None;
        }
        Some(truncate_chars(&squash_whitespace(sentence), DECISION_MAX_CHARS))
    })
}

/// Heuristic for unflagged compaction summaries.
pub fn is_summary_shaped(text: &str) -> bool {
    if text.chars().count() < SUMMARY_MIN_CHARS {
        return false;
    }
    let lower = text.to_lowercase();
    if TOOL_ECHO_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    lower.contains("summary") && CONTINUATION_PHRASES.iter().any(|p| lower.contains(p))
}

/// Split prose on sentence terminators and line breaks.
fn sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => bytes
                .get(i + 1)
                .map_or(true, |b| b.is_ascii_whitespace()),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            let s = text[start..end].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
