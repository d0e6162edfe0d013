//! Secure-shell execution tool.
//!
//! Loads the named private key from the vault, materializes it to a 0600
//! temp file for the duration of the call, and runs `ssh` non-interactively.
//! The key file is unlinked on every exit path via the RAII guard.
//!
//! Host keys are accepted on first use and not persisted
//! (`StrictHostKeyChecking=accept-new`, `UserKnownHostsFile=/dev/null`);
//! targets are gated by the ssh host allow-list instead.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tamalebot_security::CredentialVault;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args::{opt_str, opt_u64, req_str};
use crate::capture::{self, DEFAULT_TIMEOUT_MS, clamp_timeout, merge_output};
use crate::keyfile::TempKeyFile;

const DEFAULT_USER: &str = "root";
const DEFAULT_PORT: u64 = 22;
const DEFAULT_KEY_NAME: &str = "SSH_KEY";

pub struct SshExecTool {
    vault: Arc<CredentialVault>,
}

impl SshExecTool {
    pub fn new(vault: Arc<CredentialVault>) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl Tool for SshExecTool {
    fn name(&self) -> &str {
        "ssh_exec"
    }

    fn description(&self) -> &str {
        "Run a command on a remote host over SSH using a private key stored in the vault."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "host": {
                    "type": "string",
                    "description": "Remote hostname or IP"
                },
                "command": {
                    "type": "string",
                    "description": "The command to run remotely"
                },
                "user": {
                    "type": "string",
                    "description": "Remote user (default root)"
                },
                "port": {
                    "type": "integer",
                    "description": "SSH port (default 22)"
                },
                "key_name": {
                    "type": "string",
                    "description": "Vault credential holding the private key (default SSH_KEY)"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default 30000, max 120000)"
                }
            },
            "required": ["host", "command"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let host = req_str(input, "host")?;
        req_str(input, "command")?;
        let user = opt_str(input, "user", DEFAULT_USER);
        let port = opt_u64(input, "port", DEFAULT_PORT);
        Ok((PolicyAction::SshExec, format!("{user}@{host}:{port}")))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let host = match req_str(input, "host") {
            Ok(h) => h,
            Err(e) => return ToolOutcome::error(e),
        };
        let command = match req_str(input, "command") {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };
        let user = opt_str(input, "user", DEFAULT_USER);
        let port = opt_u64(input, "port", DEFAULT_PORT);
        let key_name = opt_str(input, "key_name", DEFAULT_KEY_NAME);
        let timeout_ms = clamp_timeout(opt_u64(input, "timeout_ms", DEFAULT_TIMEOUT_MS));

        let private_key = match self.vault.get(key_name).await {
            Ok(Some((value, _))) => value,
            Ok(None) => {
                return ToolOutcome::error(format!("SSH key '{key_name}' not found in vault"));
            }
            Err(e) => return ToolOutcome::error(e.to_string()),
        };

        // RAII: the key file is removed when this guard drops, on every path.
        let key_file = match TempKeyFile::create(&private_key) {
            Ok(f) => f,
            Err(e) => return ToolOutcome::error(e),
        };

        debug!(host, user, port, "Running remote command over SSH");

        let mut cmd = Command::new("ssh");
        cmd.arg("-i")
            .arg(key_file.path())
            .args(["-p", &port.to_string()])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "BatchMode=yes"])
            .arg(format!("{user}@{host}"))
            .arg(command);

        let capture = match capture::run(cmd, timeout_ms).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };

        if capture.timed_out {
            warn!(host, "SSH command timed out");
            return ToolOutcome::error(format!("SSH command timed out after {timeout_ms}ms"));
        }

        let output = merge_output(&capture.stdout, &capture.stderr);
        match capture.exit_code {
            Some(0) => ToolOutcome::ok(output),
            Some(code) => ToolOutcome::error(format!("[exit code: {code}]\n{output}")),
            None => ToolOutcome::error(format!("SSH terminated abnormally\n{output}")),
        }
    }
}
