//! Git tool — version-control operations in the agent workspace.
//!
//! For `clone`, `pull`, and `push` with a vault available, a deploy key is
//! materialized exactly like the ssh tool's and handed to git via
//! `GIT_SSH_COMMAND`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tamalebot_security::CredentialVault;
use tokio::process::Command;
use tracing::debug;

use crate::args::{opt_str, opt_u64, req_str};
use crate::capture::{self, DEFAULT_TIMEOUT_MS, clamp_timeout, merge_output};
use crate::keyfile::TempKeyFile;

const DEFAULT_DEPLOY_KEY: &str = "GIT_DEPLOY_KEY";
const ACTIONS: &[&str] = &[
    "clone", "pull", "push", "status", "diff", "commit", "log", "checkout",
];

pub struct GitTool {
    workdir: PathBuf,
    vault: Option<Arc<CredentialVault>>,
}

impl GitTool {
    pub fn new(workdir: PathBuf, vault: Option<Arc<CredentialVault>>) -> Self {
        Self { workdir, vault }
    }

    /// Repo-or-path half of the policy target.
    fn subject(&self, input: &Map<String, Value>) -> String {
        if let Some(url) = input.get("url").and_then(Value::as_str) {
            return url.to_string();
        }
        if let Some(path) = input.get("path").and_then(Value::as_str) {
            return path.to_string();
        }
        self.workdir.to_string_lossy().into_owned()
    }

    fn build_args(action: &str, input: &Map<String, Value>) -> Result<Vec<String>, String> {
        let mut args = vec![action.to_string()];
        match action {
            "clone" => {
                let url = req_str(input, "url")?;
                args.push(url.to_string());
                if let Some(dir) = input.get("dir").and_then(Value::as_str) {
                    args.push(dir.to_string());
                }
            }
            "pull" | "push" => {
                if let Some(remote) = input.get("remote").and_then(Value::as_str) {
                    args.push(remote.to_string());
                    if let Some(branch) = input.get("branch").and_then(Value::as_str) {
                        args.push(branch.to_string());
                    }
                }
            }
            "commit" => {
                let message = req_str(input, "message")?;
                args.push("-am".to_string());
                args.push(message.to_string());
            }
            "checkout" => {
                let branch = req_str(input, "branch")?;
                args.push(branch.to_string());
            }
            "log" => {
                args.push("--oneline".to_string());
                args.push(format!("-{}", opt_u64(input, "count", 20)));
            }
            "status" | "diff" => {}
            other => return Err(format!("Unknown git action: {other}")),
        }
        Ok(args)
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> &str {
        "Run a git operation: clone, pull, push, status, diff, commit, log, or checkout. \
         Remote operations use the deploy key from the vault when one is stored."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "The git operation"
                },
                "url": {
                    "type": "string",
                    "description": "Repository URL (clone)"
                },
                "path": {
                    "type": "string",
                    "description": "Repository path (defaults to the agent workspace)"
                },
                "message": {
                    "type": "string",
                    "description": "Commit message (commit)"
                },
                "branch": {
                    "type": "string",
                    "description": "Branch name (checkout, pull, push)"
                },
                "remote": {
                    "type": "string",
                    "description": "Remote name (pull, push)"
                },
                "key_name": {
                    "type": "string",
                    "description": "Vault credential holding the deploy key (default GIT_DEPLOY_KEY)"
                }
            },
            "required": ["action"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let action = req_str(input, "action")?;
        if !ACTIONS.contains(&action) {
            return Err(format!("Unknown git action: {action}"));
        }
        // Validate action-specific required inputs up front.
        Self::build_args(action, input)?;
        Ok((PolicyAction::Git, format!("{action} {}", self.subject(input))))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let action = match req_str(input, "action") {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(e),
        };
        let args = match Self::build_args(action, input) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(e),
        };

        let cwd = input
            .get("path")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.workdir.clone());
        if let Err(e) = tokio::fs::create_dir_all(&cwd).await {
            return ToolOutcome::error(format!("Failed to prepare workspace: {e}"));
        }

        let mut cmd = Command::new("git");
        cmd.args(&args).current_dir(&cwd);

        // Deploy key for remote operations; hold the guard across the run.
        let mut _key_guard: Option<TempKeyFile> = None;
        if matches!(action, "clone" | "pull" | "push")
            && let Some(vault) = &self.vault
        {
            let key_name = opt_str(input, "key_name", DEFAULT_DEPLOY_KEY);
            match vault.get(key_name).await {
                Ok(Some((private_key, _))) => {
                    let key_file = match TempKeyFile::create(&private_key) {
                        Ok(f) => f,
                        Err(e) => return ToolOutcome::error(e),
                    };
                    cmd.env(
                        "GIT_SSH_COMMAND",
                        format!(
                            "ssh -i {} -o StrictHostKeyChecking=accept-new -o UserKnownHostsFile=/dev/null -o BatchMode=yes",
                            key_file.path().display()
                        ),
                    );
                    _key_guard = Some(key_file);
                }
                // No deploy key stored: proceed with ambient credentials.
                Ok(None) => {}
                Err(e) => return ToolOutcome::error(e.to_string()),
            }
        }

        debug!(action, cwd = %cwd.display(), "Running git");

        let timeout_ms = clamp_timeout(opt_u64(input, "timeout_ms", DEFAULT_TIMEOUT_MS));
        let capture = match capture::run(cmd, timeout_ms).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };

        if capture.timed_out {
            return ToolOutcome::error(format!("git {action} timed out after {timeout_ms}ms"));
        }

        let output = merge_output(&capture.stdout, &capture.stderr);
        match capture.exit_code {
            Some(0) => ToolOutcome::ok(output),
            Some(code) => ToolOutcome::error(format!("[exit code: {code}]\n{output}")),
            None => ToolOutcome::error(format!("git terminated abnormally\n{output}")),
        }
    }
}
