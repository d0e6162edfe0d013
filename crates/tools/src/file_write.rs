//! File write tool.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};

use crate::args::req_str;

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Overwrites existing files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let path = req_str(input, "path")?;
        req_str(input, "content")?;
        Ok((PolicyAction::FileWrite, path.to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let path = match req_str(input, "path") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::error(e),
        };
        let content = match req_str(input, "content") {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(e),
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolOutcome::error(format!("Failed to create parent directories: {e}"));
                }
            }
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => ToolOutcome::ok(format!("Wrote {} bytes to {path}", content.len())),
            Err(e) => ToolOutcome::error(format!("Failed to write file: {e}")),
        }
    }
}
