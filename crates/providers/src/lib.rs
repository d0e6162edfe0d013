//! LLM provider adapters for Tamalebot.
//!
//! Two wire dialects cover the field: the Anthropic-native Messages API
//! (content blocks, which our canonical history mirrors) and the
//! OpenAI-compatible chat-completions shape (function calls), which most
//! other vendors expose.

pub mod anthropic;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;
use tamalebot_core::ChatProvider;

/// Which dialect a model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Anthropic,
    OpenAi,
}

/// Infer the wire dialect from a model identifier prefix.
pub fn detect_dialect(model: &str) -> Dialect {
    let lower = model.to_lowercase();
    const OPENAI_PREFIXES: &[&str] = &["gpt", "o1", "o3", "kimi", "gemini", "minimax"];
    if lower.starts_with("claude") {
        Dialect::Anthropic
    } else if OPENAI_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        Dialect::OpenAi
    } else {
        Dialect::Anthropic
    }
}

/// Settings shared by both adapters.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub base_url: Option<String>,
}

/// Build a provider for the given settings, honoring an explicit override
/// ("anthropic" / "openai") and otherwise detecting from the model name.
pub fn resolve_provider(
    settings: ProviderSettings,
    provider_override: Option<&str>,
) -> Arc<dyn ChatProvider> {
    let dialect = match provider_override {
        Some("anthropic") => Dialect::Anthropic,
        Some("openai") => Dialect::OpenAi,
        _ => detect_dialect(&settings.model),
    };
    match dialect {
        Dialect::Anthropic => Arc::new(AnthropicProvider::new(settings)),
        Dialect::OpenAi => Arc::new(OpenAiCompatProvider::new(settings)),
    }
}
