//! Error text normalization applied before error entries are deduplicated.
//!
//! Tool output for the same failure differs run to run (timings, paths in
//! stack frames, progress lines). Reducing it to the line that names the
//! failure lets repeated failures collapse into one memory entry.

use crate::text::{squash_whitespace, truncate_chars};

const MAX_ERROR_CHARS: usize = 300;
const MAX_SHELL_LINES: usize = 4;

const SHELL_FAILURE_MARKERS: &[&str] = &[
    "exit code",
    "exited with",
    "command not found",
    "no such file or directory",
    "permission denied",
    "failed",
];

const FAILURE_KEYWORDS: &[&str] = &[
    "error",
    "fail",
    "fatal",
    "exception",
    "not found",
    "denied",
    "cannot",
    "no such",
    "exit code",
    "panicked",
];

const BOILERPLATE_PREFIXES: &[&str] = &[
    "at ",
    "npm warn",
    "warning:",
    "note:",
    "help:",
    "-->",
    "|",
    "=",
    "...",
    "+ ",
    "> ",
    "running ",
    "compiling ",
    "finished ",
];

/// Reduce raw error output to a short, stable description.
pub fn normalize_error(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return String::new();
    }

    // Compiler / linter output: the first line naming the error.
    if let Some(line) = lines.iter().find(|l| is_compiler_error_line(l)) {
        return truncate_chars(&squash_whitespace(line), MAX_ERROR_CHARS);
    }

    let lower = text.to_lowercase();
    if SHELL_FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
        let meaningful: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| is_meaningful(l))
            .take(MAX_SHELL_LINES)
            .collect();
        if !meaningful.is_empty() {
            return truncate_chars(&squash_whitespace(&meaningful.join(" | ")), MAX_ERROR_CHARS);
        }
    }

    let first = lines[0];
    let chosen = if is_boilerplate(first) {
        lines[lines.len() - 1]
    } else {
        first
    };
    truncate_chars(&squash_whitespace(chosen), MAX_ERROR_CHARS)
}

fn is_compiler_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error:") || lower.starts_with("error[") || lower.contains(" error ts")
}

fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_meaningful(line: &str) -> bool {
    let lower = line.to_lowercase();
    !is_boilerplate(line) || FAILURE_KEYWORDS.iter().any(|k| lower.contains(k))
}
