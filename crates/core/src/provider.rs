//! Provider trait — the abstraction over LLM backends.
//!
//! A `ChatProvider` exchanges the canonical history for one whole assistant
//! response. Responses are delivered complete — there is no streaming path.
//!
//! Implementations: Anthropic-native (content blocks), OpenAI-compatible
//! (function-call style).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::message::ChatMessage;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    /// Call identifier, unique within the turn
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Structured input
    pub input: Map<String, Value>,
}

/// One complete assistant response, normalized across wire dialects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// All text content, with block boundaries joined by newlines
    pub text: String,

    /// Requested tool invocations, in response order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<LlmToolCall>,

    /// Provider-reported stop reason, when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Prompt tokens consumed by this exchange
    pub input_tokens: u64,

    /// Completion tokens produced by this exchange
    pub output_tokens: u64,
}

/// The core provider trait.
///
/// The agent loop calls `send_message` without knowing which wire dialect is
/// underneath — pure polymorphism over the canonical history.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Exchange the history (plus tool catalog) for one assistant response.
    async fn send_message(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> std::result::Result<LlmResponse, ProviderError>;
}
