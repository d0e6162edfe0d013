//! Vault tool — the LLM-facing surface of the credential vault.
//!
//! `get` responses are masked: the model sees the first four characters and
//! mask characters, never the plaintext. Tools that *use* a credential (ssh,
//! git) go through the vault's library API instead.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tamalebot_security::{CredentialType, CredentialVault, mask_value};

use crate::args::{opt_str, req_str};

pub struct VaultTool {
    vault: Arc<CredentialVault>,
}

impl VaultTool {
    pub fn new(vault: Arc<CredentialVault>) -> Self {
        Self { vault }
    }
}

fn parse_type(s: &str) -> CredentialType {
    match s {
        "api_key" => CredentialType::ApiKey,
        "ssh_key" => CredentialType::SshKey,
        "ssh_public_key" => CredentialType::SshPublicKey,
        "token" => CredentialType::Token,
        "database_url" => CredentialType::DatabaseUrl,
        _ => CredentialType::Generic,
    }
}

fn type_name(kind: CredentialType) -> &'static str {
    match kind {
        CredentialType::ApiKey => "api_key",
        CredentialType::SshKey => "ssh_key",
        CredentialType::SshPublicKey => "ssh_public_key",
        CredentialType::Token => "token",
        CredentialType::DatabaseUrl => "database_url",
        CredentialType::Generic => "generic",
    }
}

#[async_trait]
impl Tool for VaultTool {
    fn name(&self) -> &str {
        "vault"
    }

    fn description(&self) -> &str {
        "Manage encrypted credentials: set, get (masked), delete, list, or generate_ssh_key. \
         Credential names are UPPER_SNAKE_CASE."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["set", "get", "delete", "list", "generate_ssh_key"],
                    "description": "The vault operation to perform"
                },
                "name": {
                    "type": "string",
                    "description": "Credential name, e.g. MY_API_KEY"
                },
                "value": {
                    "type": "string",
                    "description": "Credential value (set only)"
                },
                "type": {
                    "type": "string",
                    "enum": ["api_key", "ssh_key", "ssh_public_key", "token", "database_url", "generic"],
                    "description": "Credential type (set only, default generic)"
                },
                "description": {
                    "type": "string",
                    "description": "Optional human-readable description (set only)"
                }
            },
            "required": ["action"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let action = req_str(input, "action")?;
        let name = opt_str(input, "name", "");
        Ok((PolicyAction::Vault, format!("{action} {name}").trim_end().to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let action = match req_str(input, "action") {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(e),
        };

        match action {
            "set" => {
                let name = match req_str(input, "name") {
                    Ok(n) => n,
                    Err(e) => return ToolOutcome::error(e),
                };
                let value = match req_str(input, "value") {
                    Ok(v) => v,
                    Err(e) => return ToolOutcome::error(e),
                };
                let kind = parse_type(opt_str(input, "type", "generic"));
                let description = input
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from);
                match self.vault.set(name, value, kind, description).await {
                    Ok(()) => ToolOutcome::ok(format!("Stored credential {name}")),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "get" => {
                let name = match req_str(input, "name") {
                    Ok(n) => n,
                    Err(e) => return ToolOutcome::error(e),
                };
                match self.vault.get(name).await {
                    Ok(Some((value, meta))) => ToolOutcome::ok(format!(
                        "{name} = {} ({})",
                        mask_value(&value),
                        type_name(meta.kind)
                    )),
                    Ok(None) => ToolOutcome::error(format!("Credential not found: {name}")),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "delete" => {
                let name = match req_str(input, "name") {
                    Ok(n) => n,
                    Err(e) => return ToolOutcome::error(e),
                };
                match self.vault.delete(name).await {
                    Ok(()) => ToolOutcome::ok(format!("Deleted credential {name}")),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "list" => match self.vault.list().await {
                Ok(entries) if entries.is_empty() => ToolOutcome::ok("Vault is empty"),
                Ok(entries) => {
                    let lines: Vec<String> = entries
                        .iter()
                        .map(|(name, meta)| {
                            let desc = meta
                                .description
                                .as_deref()
                                .map(|d| format!(" — {d}"))
                                .unwrap_or_default();
                            format!("{name} ({}){desc}", type_name(meta.kind))
                        })
                        .collect();
                    ToolOutcome::ok(lines.join("\n"))
                }
                Err(e) => ToolOutcome::error(e.to_string()),
            },
            "generate_ssh_key" => {
                let name = match req_str(input, "name") {
                    Ok(n) => n,
                    Err(e) => return ToolOutcome::error(e),
                };
                match self.vault.generate_ssh_key(name).await {
                    Ok(public_line) => {
                        ToolOutcome::ok(format!("Generated keypair {name}. Public key:\n{public_line}"))
                    }
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            other => ToolOutcome::error(format!("Unknown vault action: {other}")),
        }
    }
}
