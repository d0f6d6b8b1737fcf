//! Wire format of the host's hook protocol.
//!
//! Every host field name lives here; the rest of the crate deals in
//! `LifecycleEvent` and `HookResponse`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use maestro_capture::{HookResponse, LifecycleEvent, StartSource};

/// JSON object the host writes to the hook's stdin.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// `SessionStart` only: startup, resume, clear or compact.
    #[serde(default)]
    pub source: Option<String>,
    /// `PreCompact` only: auto or manual.
    #[serde(default)]
    pub trigger: Option<String>,
}

impl HookInput {
    /// Decode stdin. Anything unreadable is treated as an empty payload.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::debug!("Unreadable hook payload: {e}");
            Self::default()
        })
    }

    /// The event to handle. An event name given on the command line wins
    /// over the payload's.
    pub fn event(&self, explicit: Option<&str>) -> LifecycleEvent {
        let name = explicit
            .or(self.hook_event_name.as_deref())
            .unwrap_or_default();
        match name {
            "SessionStart" => LifecycleEvent::SessionStart {
                source: self.source.as_deref().and_then(StartSource::parse),
            },
            "PreCompact" => LifecycleEvent::PreCompact {
                trigger: self.trigger.clone(),
            },
            "PostToolUse" => LifecycleEvent::PostToolUse,
            "UserPromptSubmit" => LifecycleEvent::UserPromptSubmit,
            "Stop" => LifecycleEvent::Stop,
            "SubagentStop" => LifecycleEvent::SubagentStop,
            "SessionEnd" => LifecycleEvent::SessionEnd,
            other => LifecycleEvent::Unknown(other.to_string()),
        }
    }

    pub fn transcript(&self) -> Option<PathBuf> {
        self.transcript_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Debug, Serialize)]
struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    hook_event_name: String,
    #[serde(rename = "additionalContext")]
    additional_context: String,
}

/// JSON object written to stdout. Serializes to `{}` when empty.
#[derive(Debug, Default, Serialize)]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    system_message: Option<String>,
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_response(event: &LifecycleEvent, response: HookResponse) -> Self {
        let blocked = response.block_reason.is_some();
        Self {
            decision: blocked.then_some("block"),
            reason: response.block_reason,
            system_message: response.system_message,
            hook_specific_output: response.additional_context.map(|context| HookSpecificOutput {
                hook_event_name: event.name().to_string(),
                additional_context: context,
            }),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
