//! OpenAI-compatible provider implementation (dialect B).
//!
//! Works with OpenAI, OpenRouter, Moonshot, Gemini-compat, MiniMax, and any
//! other `/chat/completions` endpoint. Unlike the Anthropic dialect, the
//! canonical block history must be translated at the boundary:
//!
//! - a configured system prompt becomes a synthetic `system` message
//! - assistant tool-use blocks become `tool_calls` with JSON-string arguments
//! - each tool-result block becomes its own `role: "tool"` message, with the
//!   content prefixed `ERROR: ` when the result is flagged
//! - tool schemas are wrapped in `{type: "function", function: {...}}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tamalebot_core::{
    ChatMessage, ChatProvider, ContentBlock, LlmResponse, LlmToolCall, MessageContent,
    ProviderError, Role, ToolSchema,
};
use tracing::{debug, warn};

use crate::ProviderSettings;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions provider for OpenAI-compatible endpoints.
pub struct OpenAiCompatProvider {
    settings: ProviderSettings,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();
        Self {
            settings,
            base_url,
            client,
        }
    }

    /// Translate canonical history into the chat-completions message list.
    fn to_api_messages(system_prompt: Option<&str>, history: &[ChatMessage]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(history.len() + 1);

        if let Some(system) = system_prompt {
            out.push(ApiMessage {
                role: "system".into(),
                content: Some(system.to_string()),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in history {
            match (&msg.role, &msg.content) {
                (Role::User, MessageContent::Text(text)) => out.push(ApiMessage {
                    role: "user".into(),
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                }),
                (Role::User, MessageContent::Blocks(blocks)) => {
                    // One tool message per result block; stray text becomes a
                    // trailing user message.
                    let mut text_parts: Vec<&str> = Vec::new();
                    for block in blocks {
                        match block {
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                                is_error,
                            } => {
                                let content = if is_error.unwrap_or(false) {
                                    format!("ERROR: {content}")
                                } else {
                                    content.clone()
                                };
                                out.push(ApiMessage {
                                    role: "tool".into(),
                                    content: Some(content),
                                    tool_calls: None,
                                    tool_call_id: Some(tool_use_id.clone()),
                                });
                            }
                            ContentBlock::Text { text } => text_parts.push(text),
                            ContentBlock::ToolUse { .. } => {}
                        }
                    }
                    if !text_parts.is_empty() {
                        out.push(ApiMessage {
                            role: "user".into(),
                            content: Some(text_parts.join("\n")),
                            tool_calls: None,
                            tool_call_id: None,
                        });
                    }
                }
                (Role::Assistant, MessageContent::Text(text)) => out.push(ApiMessage {
                    role: "assistant".into(),
                    content: Some(text.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                }),
                (Role::Assistant, MessageContent::Blocks(blocks)) => {
                    let mut text_parts: Vec<&str> = Vec::new();
                    let mut calls = Vec::new();
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => text_parts.push(text),
                            ContentBlock::ToolUse { id, name, input } => calls.push(ApiToolCall {
                                id: id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: name.clone(),
                                    arguments: serde_json::to_string(input).unwrap_or_default(),
                                },
                            }),
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }
                    let text = text_parts.join("\n");
                    if calls.is_empty() {
                        out.push(ApiMessage {
                            role: "assistant".into(),
                            content: Some(text),
                            tool_calls: None,
                            tool_call_id: None,
                        });
                    } else {
                        out.push(ApiMessage {
                            role: "assistant".into(),
                            content: if text.is_empty() { None } else { Some(text) },
                            tool_calls: Some(calls),
                            tool_call_id: None,
                        });
                    }
                }
            }
        }

        out
    }

    fn to_api_tools(tools: &[ToolSchema]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send_message(
        &self,
        history: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> std::result::Result<LlmResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages =
            Self::to_api_messages(self.settings.system_prompt.as_deref(), history);
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(tools));
        }

        debug!(provider = "openai", model = %self.settings.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        fold_response(api_resp)
    }
}

fn fold_response(resp: ApiResponse) -> Result<LlmResponse, ProviderError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|tc| tc.r#type == "function")
        .map(|tc| {
            let raw = if tc.function.arguments.is_empty() {
                "{}".to_string()
            } else {
                tc.function.arguments
            };
            LlmToolCall {
                id: tc.id,
                name: tc.function.name,
                input: serde_json::from_str::<Map<String, Value>>(&raw).unwrap_or_default(),
            }
        })
        .collect();

    let usage = resp.usage.unwrap_or_default();
    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        stop_reason: choice.finish_reason,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    })
}

// --- Chat-completions API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_becomes_first_message() {
        let history = vec![ChatMessage::user("Hi")];
        let msgs = OpenAiCompatProvider::to_api_messages(Some("Be helpful"), &history);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[0].content.as_deref(), Some("Be helpful"));
        assert_eq!(msgs[1].role, "user");
    }

    #[test]
    fn assistant_blocks_become_tool_calls() {
        let mut input = Map::new();
        input.insert("command".into(), serde_json::json!("ls"));
        let history = vec![ChatMessage::assistant_blocks(vec![
            ContentBlock::text("Let me check."),
            ContentBlock::tool_use("tool_1", "shell", input),
        ])];

        let msgs = OpenAiCompatProvider::to_api_messages(None, &history);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, "assistant");
        assert_eq!(msgs[0].content.as_deref(), Some("Let me check."));
        let calls = msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "tool_1");
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(calls[0].function.name, "shell");
        assert!(calls[0].function.arguments.contains("\"command\""));
    }

    #[test]
    fn tool_only_assistant_has_null_content() {
        let history = vec![ChatMessage::assistant_blocks(vec![ContentBlock::tool_use(
            "tool_1",
            "shell",
            Map::new(),
        )])];
        let msgs = OpenAiCompatProvider::to_api_messages(None, &history);
        assert!(msgs[0].content.is_none());
        let json = serde_json::to_string(&msgs[0]).unwrap();
        assert!(!json.contains("\"content\""), "null content must be omitted: {json}");
    }

    #[test]
    fn each_tool_result_becomes_its_own_tool_message() {
        let history = vec![ChatMessage::tool_results(vec![
            ContentBlock::tool_result("tool_1", "first output", false),
            ContentBlock::tool_result("tool_2", "went wrong", true),
        ])];

        let msgs = OpenAiCompatProvider::to_api_messages(None, &history);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "tool");
        assert_eq!(msgs[0].tool_call_id.as_deref(), Some("tool_1"));
        assert_eq!(msgs[0].content.as_deref(), Some("first output"));
        assert_eq!(msgs[1].tool_call_id.as_deref(), Some("tool_2"));
        assert_eq!(msgs[1].content.as_deref(), Some("ERROR: went wrong"));
    }

    #[test]
    fn tool_schemas_are_function_wrapped() {
        let tools = vec![ToolSchema {
            name: "shell".into(),
            description: "Run a command".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools[0]["type"], "function");
        assert_eq!(api_tools[0]["function"]["name"], "shell");
        assert_eq!(api_tools[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn fold_parses_tool_call_arguments() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "shell", "arguments": "{\"command\": \"ls\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
            }"#,
        )
        .unwrap();

        let folded = fold_response(resp).unwrap();
        assert!(folded.text.is_empty());
        assert_eq!(folded.tool_calls.len(), 1);
        assert_eq!(folded.tool_calls[0].input["command"], "ls");
        assert_eq!(folded.input_tokens, 12);
        assert_eq!(folded.output_tokens, 7);
    }

    #[test]
    fn fold_defaults_empty_arguments_to_empty_map() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "vault", "arguments": ""}
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();
        let folded = fold_response(resp).unwrap();
        assert!(folded.tool_calls[0].input.is_empty());
    }

    #[test]
    fn fold_rejects_empty_choices() {
        let resp: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(fold_response(resp).is_err());
    }

    #[test]
    fn fold_plain_text_response() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {"role": "assistant", "content": "Hello!"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2}
            }"#,
        )
        .unwrap();
        let folded = fold_response(resp).unwrap();
        assert_eq!(folded.text, "Hello!");
        assert!(folded.tool_calls.is_empty());
        assert_eq!(folded.stop_reason.as_deref(), Some("stop"));
    }
}
