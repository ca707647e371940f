//! The agent session boundary: typed stream events, the option profile a
//! session is opened with, and the backends that produce event streams.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BenchError;

pub mod cli;
pub mod options;
pub mod scripted;

pub use cli::ClaudeCli;
pub use options::{
    McpServerConfig, PermissionMode, SessionDefaults, SessionOptions, SettingSource,
    SystemPrompt,
};
pub use scripted::{ScriptedBackend, ScriptedCall};

pub type SessionEventStream =
    Pin<Box<dyn Stream<Item = Result<SessionEvent, BenchError>> + Send>>;

#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Opens a session for `prompt` and returns its events in arrival order.
    async fn open(
        &self,
        prompt: &str,
        options: &SessionOptions,
    ) -> Result<SessionEventStream, BenchError>;
}

/// One line of the agent's streamed output, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    System(SystemEvent),
    Assistant(AssistantEvent),
    User(UserEvent),
    Result(ResultEvent),
    #[serde(other)]
    Other,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::System(_) => "system",
            SessionEvent::Assistant(_) => "assistant",
            SessionEvent::User(_) => "user",
            SessionEvent::Result(_) => "result",
            SessionEvent::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SystemEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserEvent {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantEvent {
    #[serde(default)]
    pub message: AssistantMessage,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AssistantEvent {
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.message.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } => Some((name.as_str(), input)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Terminal event carrying aggregate usage, cost, timing and the final text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub usage: Option<ResultUsage>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub duration_api_ms: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ResultEvent {
    /// Reads whatever fields are well-formed from a `result` line that does
    /// not match the typed shape. Error entries that are not strings are kept
    /// as their JSON text.
    pub fn from_value_lenient(value: &Value) -> Self {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| value.get(key).and_then(Value::as_u64);
        Self {
            subtype: string("subtype").unwrap_or_default(),
            is_error: value.get("is_error").and_then(Value::as_bool),
            usage: value
                .get("usage")
                .and_then(|usage| serde_json::from_value(usage.clone()).ok()),
            total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
            num_turns: number("num_turns").and_then(|n| u32::try_from(n).ok()),
            duration_ms: number("duration_ms"),
            duration_api_ms: number("duration_api_ms"),
            result: string("result"),
            errors: value.get("errors").and_then(Value::as_array).map(|errors| {
                errors
                    .iter()
                    .map(|e| match e {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            }),
            session_id: string("session_id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}
