//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: execute
//! shell commands, read/write files, fetch pages, use credentials. Every
//! invocation is mediated: the executor classifies it as a policy action,
//! asks the policy engine, and writes an audit entry before anything runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::policy::PolicyAction;
use crate::provider::ToolSchema;

/// The result of one tool invocation.
///
/// Tools never raise out of the executor: failures come back as an outcome
/// with the error flag set so the model can observe them and adapt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Output text, already truncated to the tool's cap
    pub output: String,

    /// Whether the invocation failed (including policy denials)
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

/// The core Tool trait.
///
/// `action` classifies an invocation for the policy decision point without
/// side effects; `perform` carries it out. The executor owns the ordering:
/// classify → evaluate → audit → perform.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> Value;

    /// Classify this invocation as (policy action, target string).
    ///
    /// Returns `Err` with a message when a required input is missing or
    /// malformed — the executor turns that into an error outcome before any
    /// policy evaluation happens.
    fn action(&self, input: &Map<String, Value>) -> std::result::Result<(PolicyAction, String), String>;

    /// Perform the side effect. Only called after the policy allowed it.
    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome;

    /// Convert this tool into a `ToolSchema` for sending to the LLM.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Aggregate result of one agent-loop turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The final assistant text (last captured text when the bound was hit)
    pub text: String,

    /// Number of tool invocations executed during the turn
    pub tool_call_count: usize,

    /// Prompt tokens accumulated across all provider calls
    pub input_tokens: u64,

    /// Completion tokens accumulated across all provider calls
    pub output_tokens: u64,

    /// Provider round-trips performed
    pub iterations: usize,
}
