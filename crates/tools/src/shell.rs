//! Shell tool — execute system commands in the agent's working directory.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args::{opt_u64, req_str};
use crate::capture::{self, DEFAULT_TIMEOUT_MS, clamp_timeout, merge_output};

/// Execute shell commands with bounded output and a hard timeout cap.
pub struct ShellTool {
    workdir: PathBuf,
    agent_id: String,
}

impl ShellTool {
    pub fn new(workdir: PathBuf, agent_id: String) -> Self {
        Self { workdir, agent_id }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the agent workspace and return stdout/stderr. \
         Use this for running programs, inspecting files, and build steps."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_ms": {
                    "type": "integer",
                    "description": "Timeout in milliseconds (default 30000, max 120000)"
                }
            },
            "required": ["command"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let command = req_str(input, "command")?;
        Ok((PolicyAction::Command, command.to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let command = match req_str(input, "command") {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };
        let timeout_ms = clamp_timeout(opt_u64(input, "timeout_ms", DEFAULT_TIMEOUT_MS));

        debug!(command = %command, timeout_ms, "Executing shell command");

        // The workdir may not exist yet on a fresh deployment.
        if let Err(e) = tokio::fs::create_dir_all(&self.workdir).await {
            return ToolOutcome::error(format!("Failed to prepare workspace: {e}"));
        }

        let mut cmd = Command::new("sh");
        cmd.args(["-c", command])
            .current_dir(&self.workdir)
            .env("TAMALEBOT_AGENT_ID", &self.agent_id);

        let capture = match capture::run(cmd, timeout_ms).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };

        if capture.timed_out {
            warn!(command = %command, timeout_ms, "Command timed out");
            return ToolOutcome::error(format!("Command timed out after {timeout_ms}ms"));
        }
        if capture.overflowed {
            warn!(command = %command, "Command output exceeded capture buffer, killed");
            return ToolOutcome::error("Command killed: output exceeded the 1 MiB capture buffer".to_string());
        }

        let output = merge_output(&capture.stdout, &capture.stderr);
        match capture.exit_code {
            Some(0) => ToolOutcome::ok(output),
            Some(code) => {
                warn!(command = %command, exit_code = code, "Command failed");
                ToolOutcome::error(format!("[exit code: {code}]\n{output}"))
            }
            None => ToolOutcome::error(format!("Command terminated by signal\n{output}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ShellTool {
        ShellTool::new(std::env::temp_dir(), "test-agent".into())
    }

    fn input(json: Value) -> Map<String, Value> {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn action_classifies_as_command() {
        let (action, target) = tool()
            .action(&input(serde_json::json!({"command": "echo hi"})))
            .unwrap();
        assert_eq!(action, PolicyAction::Command);
        assert_eq!(target, "echo hi");
    }

    #[test]
    fn missing_command_is_input_error() {
        assert!(tool().action(&input(serde_json::json!({}))).is_err());
    }

    #[tokio::test]
    async fn echo_succeeds() {
        let outcome = tool()
            .perform(&input(serde_json::json!({"command": "echo hello"})))
            .await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.output, "hello");
    }

    #[tokio::test]
    async fn agent_id_is_in_environment() {
        let outcome = tool()
            .perform(&input(serde_json::json!({"command": "echo $TAMALEBOT_AGENT_ID"})))
            .await;
        assert_eq!(outcome.output, "test-agent");
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_code() {
        let outcome = tool()
            .perform(&input(serde_json::json!({"command": "echo oops >&2; exit 2"})))
            .await;
        assert!(outcome.is_error);
        assert!(outcome.output.contains("[exit code: 2]"));
        assert!(outcome.output.contains("--- stderr ---"));
        assert!(outcome.output.contains("oops"));
    }

    #[tokio::test]
    async fn timeout_is_error() {
        let outcome = tool()
            .perform(&input(serde_json::json!({"command": "sleep 10", "timeout_ms": 200})))
            .await;
        assert!(outcome.is_error);
        assert!(outcome.output.contains("timed out"));
    }

    #[tokio::test]
    async fn result_is_truncated_to_cap() {
        let outcome = tool()
            .perform(&input(serde_json::json!({
                "command": "head -c 50000 /dev/zero | tr '\\0' 'x'"
            })))
            .await;
        assert!(!outcome.is_error);
        assert!(outcome.output.len() <= 10_000);
    }
}
