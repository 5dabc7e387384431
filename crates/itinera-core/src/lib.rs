use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod config;
pub mod document;

pub use config::{AgentLoopConfig, AppConfig, ClockConfig, LlmConfig, StoreConfig};
pub use document::{
    CATEGORIES, Day, Document, Extra, Item, ItemOption, ItemStatus, Meta, Profile, Suitability,
    Violation,
};

pub type Result<T> = anyhow::Result<T>;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".itinera")
}

/// Offset for `hours` east of UTC, falling back to UTC when out of range.
pub fn fixed_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Current wall-clock time in the trip's time zone.
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    pub name: String,
    /// Structured input exactly as the provider returned it.
    #[serde(default)]
    pub input: serde_json::Value,
}

fn default_finish_reason() -> String {
    "end_turn".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
    #[serde(default)]
    pub tool_calls: Vec<LlmToolCall>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: default_finish_reason(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    pub fn tool_use(text: impl Into<String>, tool_calls: Vec<LlmToolCall>) -> Self {
        Self {
            text: text.into(),
            finish_reason: "tool_use".to_string(),
            tool_calls,
            usage: TokenUsage::default(),
        }
    }
}

/// A message in a multi-turn conversation.
///
/// The system prompt is not a message here; it travels on [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum ChatMessage {
    #[serde(rename = "user")]
    User { content: String },
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        tool_calls: Vec<LlmToolCall>,
    },
    #[serde(rename = "tool")]
    Tool {
        tool_call_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// One prior exchange supplied by the caller as conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    #[serde(default)]
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            text: text.into(),
        }
    }

    /// Replayable turns are user/assistant with non-blank text.
    pub fn to_message(&self) -> Option<ChatMessage> {
        if self.text.trim().is_empty() {
            return None;
        }
        match self.role.as_str() {
            "user" => Some(ChatMessage::User {
                content: self.text.clone(),
            }),
            "assistant" => Some(ChatMessage::Assistant {
                content: Some(self.text.clone()),
                tool_calls: Vec::new(),
            }),
            _ => None,
        }
    }
}

/// A tool definition sent to the model: name, description, JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Request for the chat-with-tools API.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq_no: u64,
    pub at: DateTime<Utc>,
    pub conversation_id: Uuid,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    ConversationStartedV1 {
        instruction: String,
        history_turns: usize,
    },
    RoundStartedV1 {
        round: u32,
    },
    ToolExecutedV1 {
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    DocumentMutatedV1 {
        tool_name: String,
        update_note: Option<String>,
    },
    TransportFailedV1 {
        auth: bool,
        error: String,
    },
    ConversationFinishedV1 {
        rounds: u32,
        mutated: bool,
        finish_reason: String,
    },
}

impl EventKind {
    pub fn category(&self) -> &'static str {
        match self {
            EventKind::ConversationStartedV1 { .. } | EventKind::ConversationFinishedV1 { .. } => {
                "conversation"
            }
            EventKind::RoundStartedV1 { .. } | EventKind::TransportFailedV1 { .. } => "llm",
            EventKind::ToolExecutedV1 { .. } => "tool",
            EventKind::DocumentMutatedV1 { .. } => "document",
        }
    }

    pub fn is_tool_event(&self) -> bool {
        self.category() == "tool"
    }
}
