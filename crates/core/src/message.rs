//! Canonical message and content-block domain types.
//!
//! These are the core value objects that flow through the entire system:
//! user text comes in, the agent loop appends messages, the provider adapter
//! translates them onto a wire dialect, and tool results come back as blocks.
//!
//! The block variants form a closed sum discriminated by a `type` tag; only
//! the provider adapters ever observe the tag on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The role of a message sender in a conversation.
///
/// Canonical history only knows `user` and `assistant`; system prompts and
/// tool-role messages are wire-dialect artifacts produced by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also carries tool-result blocks back to the model)
    User,
    /// The AI assistant
    Assistant,
}

/// A single typed content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// An opaque UTF-8 text span.
    Text { text: String },

    /// The model requests a tool invocation.
    ToolUse {
        /// Call identifier, unique within the turn
        id: String,
        /// Name of the tool to invoke
        name: String,
        /// Structured input (string-keyed JSON map)
        input: Map<String, Value>,
    },

    /// The outcome of a tool invocation, answering a `ToolUse` by id.
    ToolResult {
        /// The call identifier of the originating tool-use block
        tool_use_id: String,
        /// The tool's output
        content: String,
        /// Omitted from the wire entirely when the call succeeded
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    /// A text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// A tool-use block.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Map<String, Value>) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// A tool-result block. The error flag is only serialized when set.
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: if is_error { Some(true) } else { None },
        }
    }

    /// Whether this is a tool-use block.
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }
}

/// Message content: either a plain string or an ordered block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Concatenated text of this content (text blocks joined with newlines).
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                parts.join("\n")
            }
        }
    }

    /// The blocks of this content, if block-structured.
    pub fn blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            Self::Text(_) => None,
            Self::Blocks(blocks) => Some(blocks),
        }
    }
}

/// A single message in the canonical conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: Role,

    /// String or block content
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message from content blocks (text + tool-use).
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Create the synthetic user message carrying tool results.
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Tool-use blocks of this message, in order.
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks.iter().filter(|b| b.is_tool_use()).collect(),
            MessageContent::Text(_) => Vec::new(),
        }
    }
}
