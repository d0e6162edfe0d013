//! Configuration records for the Tamalebot runtime.
//!
//! The core crates never read the process environment; everything they need
//! arrives as an explicit configuration record. `AgentConfig::from_env` is
//! the single place environment variables are consulted, called once by the
//! hosting binary at startup.

pub mod policy;

pub use policy::PolicyConfig;

use serde::{Deserialize, Serialize};
use tamalebot_core::Error;

/// Runtime configuration for one agent instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stable agent identifier (audit files and vault keys are bound to it)
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Display name
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Model identifier (also drives provider detection)
    #[serde(default = "default_model")]
    pub model: String,

    /// Explicit provider override ("anthropic" or "openai"); inferred from
    /// the model when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// API key for the provider
    pub api_key: String,

    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Security policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Deployment mode label ("hosted", "local", …); informational
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Working directory for shell/git tools
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// Data directory (audit journal, filesystem storage root)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Maximum provider round-trips per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Remote object-store URL; local filesystem storage when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,

    /// Source string for vault key derivation; vault disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_key_source: Option<String>,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_agent_id() -> String {
    "tamale".into()
}
fn default_agent_name() -> String {
    "Tamalebot".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_workdir() -> String {
    "/tmp/tamalebot-workspace".into()
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    format!("{home}/.tamalebot")
}
fn default_max_iterations() -> usize {
    20
}
fn default_port() -> u16 {
    8080
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("agent_id", &self.agent_id)
            .field("agent_name", &self.agent_name)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("policy", &self.policy.name)
            .field("workdir", &self.workdir)
            .field("data_dir", &self.data_dir)
            .field("max_iterations", &self.max_iterations)
            .field("storage_url", &self.storage_url)
            .field("vault_key_source", &self.vault_key_source.as_ref().map(|_| "[REDACTED]"))
            .field("port", &self.port)
            .finish()
    }
}

/// Environment variables consulted for the API key, in order.
const API_KEY_VARS: &[&str] = &[
    "TAMALEBOT_API_KEY",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
];

impl AgentConfig {
    /// Build a config from the process environment.
    ///
    /// A missing API key is a fatal startup error; everything else falls
    /// back to defaults.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|v| std::env::var(v).ok().filter(|s| !s.is_empty()))
            .ok_or_else(|| Error::Config {
                message: format!("No API key found; set one of: {}", API_KEY_VARS.join(", ")),
            })?;

        let policy_name =
            std::env::var("TAMALEBOT_POLICY").unwrap_or_else(|_| "default".into());

        Ok(Self {
            agent_id: std::env::var("TAMALEBOT_AGENT_ID").unwrap_or_else(|_| default_agent_id()),
            agent_name: std::env::var("TAMALEBOT_AGENT_NAME")
                .unwrap_or_else(|_| default_agent_name()),
            model: std::env::var("TAMALEBOT_MODEL").unwrap_or_else(|_| default_model()),
            provider: std::env::var("TAMALEBOT_PROVIDER").ok(),
            api_key,
            system_prompt: std::env::var("TAMALEBOT_SYSTEM_PROMPT").ok(),
            policy: PolicyConfig::by_name(&policy_name),
            mode: std::env::var("TAMALEBOT_MODE").ok(),
            workdir: std::env::var("TAMALEBOT_WORKDIR").unwrap_or_else(|_| default_workdir()),
            data_dir: std::env::var("TAMALEBOT_DATA_DIR").unwrap_or_else(|_| default_data_dir()),
            max_iterations: default_max_iterations(),
            storage_url: std::env::var("TAMALEBOT_STORAGE_URL").ok(),
            vault_key_source: std::env::var("TAMALEBOT_VAULT_KEY").ok(),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_port),
        })
    }

    /// A config suitable for tests: fixed ids, permissive-ish defaults.
    pub fn for_tests() -> Self {
        Self {
            agent_id: "test-agent".into(),
            agent_name: "Test Agent".into(),
            model: "claude-sonnet-4-20250514".into(),
            provider: None,
            api_key: "sk-test".into(),
            system_prompt: None,
            policy: PolicyConfig::default(),
            mode: None,
            workdir: std::env::temp_dir().to_string_lossy().into_owned(),
            data_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            max_iterations: default_max_iterations(),
            storage_url: None,
            vault_key_source: Some("test-vault-key".into()),
            port: 0,
        }
    }
}
