//! Maps host lifecycle events onto capture, sync and the stop gate.

use std::path::PathBuf;

use maestro_core::config::Settings;
use maestro_core::paths::is_fresh_project;
use maestro_core::ralph::{
    AllowReason, FileIterationPort, GateDecision, IterationController, StopKind,
};
use maestro_core::storage::MemoryStore;

use crate::compaction::{CaptureOutcome, CompactionCapturer};
use crate::digest::render_digest;
use crate::error::CaptureError;
use crate::session::{discover_session, SessionHandle, SessionLookup};
use crate::sync::{SyncPipeline, SyncReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSource {
    Startup,
    Resume,
    Clear,
    Compact,
}

impl StartSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "startup" => Some(Self::Startup),
            "resume" => Some(Self::Resume),
            "clear" => Some(Self::Clear),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    /// The history was just compacted or restored, so a summary may exist.
    fn follows_compaction(&self) -> bool {
        matches!(self, Self::Resume | Self::Compact)
    }
}

/// Whether a session start begins a new conversation rather than continuing
/// the current one. Only new conversations may archive memory.
fn starts_new_conversation(source: Option<&StartSource>) -> bool {
    matches!(source, None | Some(StartSource::Startup | StartSource::Clear))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    SessionStart { source: Option<StartSource> },
    PreCompact { trigger: Option<String> },
    PostToolUse,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    SessionEnd,
    Unknown(String),
}

impl LifecycleEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::SessionStart { .. } => "SessionStart",
            Self::PreCompact { .. } => "PreCompact",
            Self::PostToolUse => "PostToolUse",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::SessionEnd => "SessionEnd",
            Self::Unknown(name) => name,
        }
    }
}

/// One hook invocation, already decoded from the host's payload.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub event: LifecycleEvent,
    pub session_id: Option<String>,
    /// Transcript path supplied by the host, if any.
    pub transcript: Option<PathBuf>,
}

/// Host-agnostic hook result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookResponse {
    /// Refuse the stop, with the reason shown to the assistant.
    pub block_reason: Option<String>,
    /// Text injected into the assistant's context.
    pub additional_context: Option<String>,
    /// Text shown to the user.
    pub system_message: Option<String>,
}

impl HookResponse {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub struct LifecycleDispatcher {
    settings: Settings,
}

impl LifecycleDispatcher {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dispatch(&self, ctx: &HookContext) -> Result<HookResponse, CaptureError> {
        tracing::debug!(event = ctx.event.name(), root = %self.settings.project_root.display(), "Dispatching hook");
        match &ctx.event {
            LifecycleEvent::SessionStart { source } => self.on_session_start(ctx, source.as_ref()),
            LifecycleEvent::PreCompact { trigger } => {
                if let Some(session) = self.resolve_session(ctx) {
                    self.capture(&session, trigger.as_deref());
                    self.sync(&session);
                }
                Ok(HookResponse::default())
            }
            LifecycleEvent::PostToolUse
            | LifecycleEvent::UserPromptSubmit
            | LifecycleEvent::SessionEnd
            | LifecycleEvent::SubagentStop => {
                if let Some(session) = self.resolve_session(ctx) {
                    self.sync(&session);
                }
                Ok(HookResponse::default())
            }
            LifecycleEvent::Stop => {
                if let Some(session) = self.resolve_session(ctx) {
                    self.sync(&session);
                }
                Ok(self.gate(StopKind::Stop))
            }
            LifecycleEvent::Unknown(name) => {
                tracing::debug!(event = %name, "Ignoring unknown lifecycle event");
                Ok(HookResponse::default())
            }
        }
    }

    fn on_session_start(
        &self,
        ctx: &HookContext,
        source: Option<&StartSource>,
    ) -> Result<HookResponse, CaptureError> {
        let store = MemoryStore::new(self.settings.brain_path());
        let mut notice = None;
        if starts_new_conversation(source) && is_fresh_project(&self.settings.project_root) {
            if let Some(archived) = store.archive()? {
                tracing::info!(to = %archived.display(), "Fresh project, archived previous memory");
                notice = Some(format!(
                    "Fresh project: previous memory archived to {}.",
                    archived.display()
                ));
            }
        }

        let mut report = SyncReport::default();
        if let Some(session) = self.resolve_session(ctx) {
            if source.is_some_and(StartSource::follows_compaction) {
                self.capture(&session, None);
            }
            report = self.sync(&session).unwrap_or_default();
        }

        let digest = render_digest(&store.preserved()?, &report.file_changes);
        let context = match (notice, digest) {
            (Some(n), Some(d)) => Some(format!("{n}\n\n{d}")),
            (n, d) => n.or(d),
        };
        Ok(HookResponse {
            additional_context: context,
            ..Default::default()
        })
    }

    /// The host-supplied transcript wins; otherwise look the session up.
    fn resolve_session(&self, ctx: &HookContext) -> Option<SessionHandle> {
        if let Some(path) = ctx.transcript.as_deref().filter(|p| p.is_file()) {
            return SessionHandle::from_transcript(path, ctx.session_id.as_deref());
        }
        match discover_session(&self.settings) {
            SessionLookup::Found(handle) => Some(handle),
            SessionLookup::Fresh | SessionLookup::NotFound => None,
        }
    }

    /// Sync failures never fail the hook.
    fn sync(&self, session: &SessionHandle) -> Option<SyncReport> {
        match SyncPipeline::new(&self.settings).run(session) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(session = %session.session_id, "Sync failed: {e}");
                None
            }
        }
    }

    fn capture(&self, session: &SessionHandle, trigger: Option<&str>) {
        let store = MemoryStore::new(self.settings.brain_path());
        let capturer =
            CompactionCapturer::new(&store, self.settings.retention, self.settings.capture_retry);
        match capturer.capture(&session.main_transcript, trigger) {
            Ok(CaptureOutcome::Captured(_)) => {}
            Ok(outcome) => tracing::debug!(?outcome, "Compaction capture"),
            Err(e) => tracing::warn!("Compaction capture failed: {e}"),
        }
    }

    /// Gate failures allow the stop.
    fn gate(&self, kind: StopKind) -> HookResponse {
        let controller = IterationController::new(FileIterationPort::new(self.settings.meta_dir()));
        let decision = match controller.on_stop(kind) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Stop gate failed, allowing: {e}");
                return HookResponse::default();
            }
        };
        match decision {
            GateDecision::Block { message, .. } => HookResponse {
                block_reason: Some(message),
                ..Default::default()
            },
            GateDecision::Allow(
                AllowReason::CompletionSignaled { current, max }
                | AllowReason::Exhausted { current, max },
            ) => HookResponse {
                system_message: Some(format!(
                    "Iteration loop finished after {} of {max} iterations.",
                    current.min(max)
                )),
                ..Default::default()
            },
            GateDecision::Allow(_) => HookResponse::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::model::{IterationMode, MemoryEntry};
    use maestro_core::paths::normalize_project_path;
    use maestro_core::storage::OffsetStore;
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        dispatcher: LifecycleDispatcher,
    }

    impl Fixture {
        fn root(&self) -> &Path {
            &self.dispatcher.settings().project_root
        }

        fn transcript_dir(&self) -> PathBuf {
            self.tmp
                .path()
                .join("projects")
                .join(normalize_project_path(self.root()))
        }

        fn write_transcript(&self, id: &str, lines: &[serde_json::Value]) -> PathBuf {
            let dir = self.transcript_dir();
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join(format!("{id}.jsonl"));
            let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
            std::fs::write(&path, body).unwrap();
            path
        }
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("app");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        let settings = Settings::new(&root, tmp.path().join("projects"))
            .with_capture_delay(Duration::ZERO);
        Fixture {
            tmp,
            dispatcher: LifecycleDispatcher::new(settings),
        }
    }

    fn event(event: LifecycleEvent) -> HookContext {
        HookContext {
            event,
            session_id: None,
            transcript: None,
        }
    }

    fn decision_line(text: &str) -> serde_json::Value {
        json!({"type": "assistant", "message": {"role": "assistant", "content": [{"type": "text", "text": text}]}})
    }

    #[test]
    fn test_fresh_start_archives_old_memory() {
        let fx = fixture();
        let brain = fx.dispatcher.settings().brain_path();
        std::fs::create_dir_all(brain.parent().unwrap()).unwrap();
        std::fs::write(&brain, "{\"type\":\"goal\",\"content\":\"old\",\"timestamp\":\"2024-01-01T00:00:00Z\"}\n").unwrap();

        let resp = fx
            .dispatcher
            .dispatch(&event(LifecycleEvent::SessionStart {
                source: Some(StartSource::Startup),
            }))
            .unwrap();

        let context = resp.additional_context.unwrap();
        assert!(context.starts_with("Fresh project"));
        assert!(!context.contains("- old"));
        assert!(!brain.exists());
        let archived = std::fs::read_dir(brain.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
            .count();
        assert_eq!(archived, 1);
    }

    #[test]
    fn test_compact_restart_keeps_current_memory() {
        let fx = fixture();
        let transcript = fx.write_transcript(
            "s1",
            &[decision_line("We decided to store sessions in SQLite for durability.")],
        );
        let with_transcript = |event| HookContext {
            event,
            session_id: Some("s1".into()),
            transcript: Some(transcript.clone()),
        };

        fx.dispatcher
            .dispatch(&with_transcript(LifecycleEvent::PostToolUse))
            .unwrap();
        let brain = fx.dispatcher.settings().brain_path();
        assert!(brain.exists());

        for source in [StartSource::Compact, StartSource::Resume] {
            let resp = fx
                .dispatcher
                .dispatch(&with_transcript(LifecycleEvent::SessionStart {
                    source: Some(source),
                }))
                .unwrap();
            let context = resp.additional_context.unwrap();
            assert!(!context.starts_with("Fresh project"));
            assert!(context.contains("SQLite"));
            assert!(brain.exists());
        }
    }

    #[test]
    fn test_session_start_digest_after_sync() {
        let fx = fixture();
        std::fs::write(fx.root().join("main.rs"), "fn main() {}").unwrap();
        fx.write_transcript(
            "s1",
            &[decision_line("We decided to keep the parser hand-written for speed.")],
        );

        let resp = fx
            .dispatcher
            .dispatch(&event(LifecycleEvent::SessionStart {
                source: Some(StartSource::Startup),
            }))
            .unwrap();
        let context = resp.additional_context.unwrap();
        assert!(context.contains("## Recent decisions"));
        assert!(context.contains("hand-written"));
    }

    #[test]
    fn test_pre_compact_captures_summary() {
        let fx = fixture();
        std::fs::write(fx.root().join("lib.rs"), "").unwrap();
        let transcript = fx.write_transcript(
            "s1",
            &[json!({"type": "user", "isCompactSummary": true,
                "message": {"role": "user", "content": "Summary of the work so far."}})],
        );

        let ctx = HookContext {
            event: LifecycleEvent::PreCompact {
                trigger: Some("manual".into()),
            },
            session_id: Some("s1".into()),
            transcript: Some(transcript),
        };
        assert!(fx.dispatcher.dispatch(&ctx).unwrap().is_empty());

        let entries = MemoryStore::new(fx.dispatcher.settings().brain_path())
            .read()
            .unwrap();
        let compacts: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                MemoryEntry::Compact(c) => Some(c),
                _ => None,
            })
            .collect();
        // Captured once; the sync pass sees the same record and dedups it.
        assert_eq!(compacts.len(), 1);
        assert_eq!(compacts[0].trigger.as_deref(), Some("manual"));
    }

    #[test]
    fn test_post_tool_use_advances_checkpoint() {
        let fx = fixture();
        std::fs::write(fx.root().join("lib.rs"), "").unwrap();
        fx.write_transcript("s1", &[decision_line("ok")]);

        let resp = fx.dispatcher.dispatch(&event(LifecycleEvent::PostToolUse)).unwrap();
        assert!(resp.is_empty());
        let offsets = OffsetStore::load(fx.dispatcher.settings().sync_state_path());
        assert!(offsets.get("s1:s1.jsonl") > 0);
    }

    #[test]
    fn test_stop_gate_blocks_then_allows() {
        let fx = fixture();
        let controller =
            IterationController::new(FileIterationPort::new(fx.dispatcher.settings().meta_dir()));
        controller.init(1, IterationMode::Tests, vec![]).unwrap();

        let first = fx.dispatcher.dispatch(&event(LifecycleEvent::Stop)).unwrap();
        assert!(first.block_reason.unwrap().contains("Iteration 1/1"));

        let sub = fx.dispatcher.dispatch(&event(LifecycleEvent::SubagentStop)).unwrap();
        assert!(sub.is_empty());

        let second = fx.dispatcher.dispatch(&event(LifecycleEvent::Stop)).unwrap();
        assert!(second.block_reason.is_none());
        assert!(second.system_message.unwrap().contains("1 of 1"));
    }

    #[test]
    fn test_unknown_event_is_noop() {
        let fx = fixture();
        let resp = fx
            .dispatcher
            .dispatch(&event(LifecycleEvent::Unknown("Notification".into())))
            .unwrap();
        assert!(resp.is_empty());
    }
}
