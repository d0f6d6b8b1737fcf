use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Project {
    tmp: TempDir,
}

impl Project {
    /// A project containing only a `.git` directory.
    fn fresh() -> Self {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("app").join(".git")).unwrap();
        Self { tmp }
    }

    /// A project with some source files.
    fn existing() -> Self {
        let project = Self::fresh();
        std::fs::write(project.root().join("main.rs"), "fn main() {}\n").unwrap();
        project
    }

    fn root(&self) -> PathBuf {
        self.tmp.path().join("app")
    }

    fn transcripts(&self) -> PathBuf {
        self.tmp.path().join("projects")
    }

    fn brain(&self) -> PathBuf {
        self.root().join(".maestro").join("brain.jsonl")
    }

    fn maestro(&self) -> Command {
        let mut cmd = Command::cargo_bin("maestro").unwrap();
        cmd.env_remove("CLAUDE_PROJECT_DIR")
            .env_remove("MAESTRO_DEBUG")
            .env_remove("MAESTRO_DEBUG_LOG")
            .env("MAESTRO_TRANSCRIPTS_DIR", self.transcripts())
            .env("MAESTRO_CAPTURE_DELAY_MS", "0")
            .arg("--project-dir")
            .arg(self.root());
        cmd
    }

    fn hook(&self, payload: Value) -> Value {
        let out = self
            .maestro()
            .arg("hook")
            .write_stdin(payload.to_string())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).unwrap()
    }

    fn write_transcript(&self, session: &str, lines: &[Value]) -> PathBuf {
        let dir = self.transcripts().join(normalized(&self.root()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{session}.jsonl"));
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        std::fs::write(&path, body).unwrap();
        path
    }
}

fn normalized(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

fn failing_bash() -> Vec<Value> {
    vec![
        json!({"type": "assistant", "message": {"role": "assistant", "content": [
            {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "cargo build"}}]}}),
        json!({"type": "user", "message": {"role": "user", "content": [
            {"type": "tool_result", "tool_use_id": "t1", "is_error": true,
             "content": "   Compiling app v0.1.0\nerror[E0425]: cannot find value `x` in this scope\n  --> src/main.rs:2:5"}]}}),
    ]
}

#[test]
fn test_garbage_stdin_yields_empty_object() {
    let project = Project::fresh();
    project
        .maestro()
        .arg("hook")
        .write_stdin("this is not json")
        .assert()
        .success()
        .stdout("{}\n");
}

#[test]
fn test_fresh_start_archives_existing_memory() {
    let project = Project::fresh();
    std::fs::create_dir_all(project.brain().parent().unwrap()).unwrap();
    std::fs::write(
        project.brain(),
        "{\"type\":\"decision\",\"content\":\"stale decision\",\"timestamp\":\"2024-01-01T00:00:00Z\"}\n",
    )
    .unwrap();

    let out = project.hook(json!({"hook_event_name": "SessionStart", "source": "startup"}));
    let context = out["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.starts_with("Fresh project"));
    assert!(!context.contains("stale decision"));
    assert!(!project.brain().exists());

    project
        .maestro()
        .args(["memory", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Memory is empty."));
}

#[test]
fn test_post_tool_use_syncs_errors() {
    let project = Project::existing();
    let transcript = project.write_transcript("s1", &failing_bash());

    let out = project.hook(json!({
        "hook_event_name": "PostToolUse",
        "session_id": "s1",
        "transcript_path": transcript,
    }));
    assert_eq!(out, json!({}));

    let brain = std::fs::read_to_string(project.brain()).unwrap();
    assert!(brain.contains("error[E0425]: cannot find value `x` in this scope"));
    assert!(!brain.contains("Compiling"));

    // Replaying the same event adds nothing.
    project.hook(json!({"hook_event_name": "PostToolUse", "session_id": "s1", "transcript_path": transcript}));
    assert_eq!(std::fs::read_to_string(project.brain()).unwrap(), brain);
}

#[test]
fn test_session_start_digest_uses_located_transcript() {
    let project = Project::existing();
    project.write_transcript("s1", &failing_bash());

    let out = project.hook(json!({"hook_event_name": "SessionStart", "source": "startup"}));
    let context = out["hookSpecificOutput"]["additionalContext"].as_str().unwrap();
    assert!(context.contains("## Recent errors"));
    assert!(context.contains("[Bash] error[E0425]"));
}

#[test]
fn test_stop_gate_loop() {
    let project = Project::fresh();
    project
        .maestro()
        .args(["ralph", "init", "--max", "2", "--mode", "tests", "--feature", "parser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to 2 iterations in tests mode"));

    for n in 1..=2 {
        let out = project.hook(json!({"hook_event_name": "Stop"}));
        assert_eq!(out["decision"], "block");
        let reason = out["reason"].as_str().unwrap();
        assert!(reason.contains(&format!("Iteration {n}/2")));
        assert!(reason.contains("parser"));

        let sub = project.hook(json!({"hook_event_name": "SubagentStop"}));
        assert_eq!(sub, json!({}));
    }

    let last = project.hook(json!({"hook_event_name": "Stop"}));
    assert!(last.get("decision").is_none());
    assert!(last["systemMessage"].as_str().unwrap().contains("2 of 2"));

    project
        .maestro()
        .args(["ralph", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inactive"));
}

#[test]
fn test_ralph_complete_ends_loop_early() {
    let project = Project::fresh();
    project.maestro().args(["ralph", "init", "--max", "5"]).assert().success();
    project.maestro().args(["ralph", "complete"]).assert().success();

    let out = project.hook(json!({"hook_event_name": "Stop"}));
    assert!(out.get("decision").is_none());
    assert!(!project.root().join(".maestro").join("ralph.active").exists());
}

#[test]
fn test_ralph_rejects_zero_budget() {
    let project = Project::fresh();
    project
        .maestro()
        .args(["ralph", "init", "--max", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn test_memory_add_and_tech() {
    let project = Project::existing();
    project
        .maestro()
        .args(["memory", "add", "decision", "Use", "SQLite", "for", "storage"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded."));
    project
        .maestro()
        .args(["memory", "add", "decision", "Use SQLite for storage"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already recorded."));
    project
        .maestro()
        .args(["memory", "tech", "language", "rust"])
        .assert()
        .success();
    project
        .maestro()
        .args(["memory", "tech", "database", "sqlite"])
        .assert()
        .success();

    let out = project
        .maestro()
        .args(["memory", "show", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: Vec<Value> = serde_json::from_slice(&out).unwrap();
    assert_eq!(entries[0]["type"], "tech_stack");
    assert_eq!(entries[0]["language"], "rust");
    assert_eq!(entries[0]["database"], "sqlite");
    assert_eq!(entries[1]["type"], "decision");
    assert_eq!(entries[1]["source"], "manual");
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_unknown_entries_survive_rewrites() {
    let project = Project::existing();
    std::fs::create_dir_all(project.brain().parent().unwrap()).unwrap();
    let foreign = r#"{"type":"discovery_report","files":12}"#;
    std::fs::write(project.brain(), format!("{foreign}\n")).unwrap();

    project
        .maestro()
        .args(["memory", "add", "goal", "Ship it"])
        .assert()
        .success();
    let brain = std::fs::read_to_string(project.brain()).unwrap();
    assert!(brain.lines().any(|l| l == foreign));
}

#[test]
fn test_locate_and_sync_commands() {
    let project = Project::existing();
    let transcript = project.write_transcript("abc", &failing_bash());

    project
        .maestro()
        .arg("locate")
        .assert()
        .success()
        .stdout(predicate::str::contains("abc").and(predicate::str::contains(
            transcript.to_string_lossy().into_owned(),
        )));

    project
        .maestro()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Read 2 records"));
    project
        .maestro()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing new to sync."));
}

#[test]
fn test_debug_log_side_channel() {
    let project = Project::fresh();
    let log = project.tmp.path().join("debug.log");
    project
        .maestro()
        .env("MAESTRO_DEBUG", "1")
        .env("MAESTRO_DEBUG_LOG", &log)
        .arg("hook")
        .write_stdin(json!({"hook_event_name": "PostToolUse"}).to_string())
        .assert()
        .success()
        .stdout("{}\n")
        .stderr("");
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("Dispatching hook"));
}

#[test]
fn test_hook_with_bad_environment_still_answers() {
    let project = Project::fresh();
    project
        .maestro()
        .env("MAESTRO_CAPTURE_DELAY_MS", "fast")
        .arg("hook")
        .write_stdin(json!({"hook_event_name": "Stop"}).to_string())
        .assert()
        .success()
        .stdout("{}\n");

    project
        .maestro()
        .args(["--format", "yaml", "hook"])
        .write_stdin(json!({"hook_event_name": "Stop"}).to_string())
        .assert()
        .success()
        .stdout("{}\n");
}

#[test]
fn test_operator_command_with_bad_flag_fails() {
    let project = Project::fresh();
    project
        .maestro()
        .args(["--format", "yaml", "memory", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yaml"));
}
