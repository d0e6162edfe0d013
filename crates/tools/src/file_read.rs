//! File read tool.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};

use crate::args::req_str;
use crate::capture::truncate_bytes;

const MAX_READ: usize = 50_000;

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path (up to 50 KB, UTF-8)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let path = req_str(input, "path")?;
        Ok((PolicyAction::FileRead, path.to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let path = match req_str(input, "path") {
            Ok(p) => p,
            Err(e) => return ToolOutcome::error(e),
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                ToolOutcome::ok(truncate_bytes(&text, MAX_READ))
            }
            Err(e) => ToolOutcome::error(format!("Failed to read file: {e}")),
        }
    }
}
