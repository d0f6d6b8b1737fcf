use serde::Deserialize;

/// One line of a host-written session transcript.
///
/// Only the fields the memory pipeline looks at are modelled; everything else
/// the host writes is ignored during deserialization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TranscriptRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<RecordMessage>,
    #[serde(default, rename = "isCompactSummary")]
    pub is_compact_summary: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RecordMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
}

/// `message.content` is either a bare string or a list of typed blocks.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

impl TranscriptRecord {
    pub fn is_assistant(&self) -> bool {
        self.record_type == "assistant"
    }

    pub fn is_user(&self) -> bool {
        self.record_type == "user"
    }

    /// Whether the host explicitly marked this record as a compaction summary.
    pub fn is_flagged_summary(&self) -> bool {
        self.is_compact_summary == Some(true)
    }

    /// Content blocks of the message. Plain-string content yields a single
    /// text block.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self.message.as_ref().map(|m| &m.content) {
            Some(MessageContent::Blocks(blocks)) => blocks.clone(),
            Some(MessageContent::Text(text)) if !text.is_empty() => {
                vec![ContentBlock::Text { text: text.clone() }]
            }
            _ => Vec::new(),
        }
    }

    /// All text carried by the message, text blocks joined by newlines.
    pub fn text(&self) -> String {
        match self.message.as_ref().map(|m| &m.content) {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Blocks(blocks)) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

/// Flatten a `tool_result` payload into text.
///
/// Hosts send either a plain string or a list of `{"type":"text","text":…}`
/// parts.
pub fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| {
                p.get("text")
                    .and_then(|t| t.as_str())
                    .or_else(|| p.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
