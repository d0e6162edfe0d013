//! Schedule tool — manage cron-style scheduled instructions.
//!
//! Schedules are persisted through the storage backend at
//! `schedules/{id}.json`. This tool only stores, lists, pauses, and resumes
//! them; evaluating due schedules is the hosting layer's concern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tamalebot_core::{PolicyAction, Tool, ToolOutcome};
use tamalebot_storage::StorageBackend;
use tracing::warn;

use crate::args::{opt_str, req_str};

const SCHEDULE_PREFIX: &str = "schedules/";

/// One stored schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// 8-hex identifier
    pub id: String,
    pub name: String,
    /// Five-field cron expression
    pub cron: String,
    /// The instruction handed to the agent when the schedule fires
    pub task: String,
    pub agent_name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
}

pub struct ScheduleTool {
    storage: Arc<dyn StorageBackend>,
    agent_name: String,
    field_re: Regex,
}

impl ScheduleTool {
    pub fn new(storage: Arc<dyn StorageBackend>, agent_name: String) -> Self {
        Self {
            storage,
            agent_name,
            field_re: Regex::new(r"^(\*|\d+)(/\d+)?(-\d+)?(,\d+)*$").expect("static pattern"),
        }
    }

    /// Validate a five-field cron expression.
    fn validate_cron(&self, expr: &str) -> Result<(), String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Cron expression must have exactly 5 fields, got {}",
                fields.len()
            ));
        }

        // minute, hour, day-of-month, month, day-of-week (0-7, both Sundays)
        const RANGES: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 7)];
        let digits = Regex::new(r"\d+").expect("static pattern");

        for (i, field) in fields.iter().enumerate() {
            if !self.field_re.is_match(field) {
                return Err(format!("Invalid cron field '{field}' at position {}", i + 1));
            }
            let (min, max) = RANGES[i];
            for m in digits.find_iter(field) {
                let n: u32 = m
                    .as_str()
                    .parse()
                    .map_err(|_| format!("Invalid number in cron field '{field}'"))?;
                if n < min || n > max {
                    return Err(format!(
                        "Value {n} out of range {min}-{max} in cron field '{field}'"
                    ));
                }
            }
        }
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<ScheduleEntry>, String> {
        let key = format!("{SCHEDULE_PREFIX}{id}.json");
        match self.storage.get(&key).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| format!("Corrupt schedule {id}: {e}")),
            Ok(None) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn save(&self, entry: &ScheduleEntry) -> Result<(), String> {
        let key = format!("{SCHEDULE_PREFIX}{}.json", entry.id);
        let bytes = serde_json::to_vec(entry).map_err(|e| e.to_string())?;
        self.storage.put(&key, &bytes).await.map_err(|e| e.to_string())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> ToolOutcome {
        match self.load(id).await {
            Ok(Some(mut entry)) => {
                entry.enabled = enabled;
                match self.save(&entry).await {
                    Ok(()) => ToolOutcome::ok(format!(
                        "Schedule {id} ({}) is now {}",
                        entry.name,
                        if enabled { "enabled" } else { "paused" }
                    )),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            Ok(None) => ToolOutcome::error(format!("Schedule not found: {id}")),
            Err(e) => ToolOutcome::error(e),
        }
    }
}

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Manage scheduled tasks: create (with a 5-field cron expression), list, delete, pause, resume."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "list", "delete", "pause", "resume"],
                    "description": "The schedule operation"
                },
                "name": {
                    "type": "string",
                    "description": "Schedule name (create)"
                },
                "cron": {
                    "type": "string",
                    "description": "Five-field cron expression, e.g. '0 9 * * 1-5' (create)"
                },
                "task": {
                    "type": "string",
                    "description": "Instruction to run when the schedule fires (create)"
                },
                "id": {
                    "type": "string",
                    "description": "Schedule id (delete, pause, resume)"
                }
            },
            "required": ["action"]
        })
    }

    fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
        let action = req_str(input, "action")?;
        let subject = opt_str(input, "name", opt_str(input, "id", ""));
        Ok((PolicyAction::Schedule, format!("{action} {subject}").trim_end().to_string()))
    }

    async fn perform(&self, input: &Map<String, Value>) -> ToolOutcome {
        let action = match req_str(input, "action") {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(e),
        };

        match action {
            "create" => {
                let name = match req_str(input, "name") {
                    Ok(n) => n,
                    Err(e) => return ToolOutcome::error(e),
                };
                let cron = match req_str(input, "cron") {
                    Ok(c) => c,
                    Err(e) => return ToolOutcome::error(e),
                };
                let task = match req_str(input, "task") {
                    Ok(t) => t,
                    Err(e) => return ToolOutcome::error(e),
                };
                if let Err(e) = self.validate_cron(cron) {
                    return ToolOutcome::error(e);
                }

                let id = format!("{:08x}", rand::rng().random::<u32>());
                let entry = ScheduleEntry {
                    id: id.clone(),
                    name: name.to_string(),
                    cron: cron.to_string(),
                    task: task.to_string(),
                    agent_name: self.agent_name.clone(),
                    enabled: true,
                    created_at: Utc::now(),
                    last_run: None,
                    last_result: None,
                };
                match self.save(&entry).await {
                    Ok(()) => ToolOutcome::ok(format!("Created schedule {id} ({name}): {cron}")),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "list" => {
                let keys = match self.storage.list(SCHEDULE_PREFIX).await {
                    Ok(k) => k,
                    Err(e) => return ToolOutcome::error(e.to_string()),
                };
                let mut lines = Vec::new();
                for key in keys {
                    let Ok(Some(bytes)) = self.storage.get(&key).await else {
                        continue;
                    };
                    match serde_json::from_slice::<ScheduleEntry>(&bytes) {
                        Ok(entry) => lines.push(format!(
                            "{} [{}] {} — '{}' ({})",
                            entry.id,
                            if entry.enabled { "on" } else { "paused" },
                            entry.cron,
                            entry.name,
                            entry.task,
                        )),
                        Err(e) => warn!(key, error = %e, "Skipping corrupt schedule"),
                    }
                }
                if lines.is_empty() {
                    ToolOutcome::ok("No schedules")
                } else {
                    ToolOutcome::ok(lines.join("\n"))
                }
            }
            "delete" => {
                let id = match req_str(input, "id") {
                    Ok(i) => i,
                    Err(e) => return ToolOutcome::error(e),
                };
                match self
                    .storage
                    .delete(&format!("{SCHEDULE_PREFIX}{id}.json"))
                    .await
                {
                    Ok(()) => ToolOutcome::ok(format!("Deleted schedule {id}")),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "pause" | "resume" => {
                let id = match req_str(input, "id") {
                    Ok(i) => i,
                    Err(e) => return ToolOutcome::error(e),
                };
                self.set_enabled(id, action == "resume").await
            }
            other => ToolOutcome::error(format!("Unknown schedule action: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamalebot_storage::MemoryBackend;

    fn tool() -> (Arc<MemoryBackend>, ScheduleTool) {
        let storage = Arc::new(MemoryBackend::new());
        let tool = ScheduleTool::new(storage.clone(), "Test Agent".into());
        (storage, tool)
    }

    fn input(json: Value) -> Map<String, Value> {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn cron_validation_accepts_common_forms() {
        let (_s, tool) = tool();
        for expr in [
            "* * * * *",
            "0 9 * * 1-5",
            "*/15 * * * *",
            "0 0 1 1 *",
            "30 6 * * 0,7",
        ] {
            assert!(tool.validate_cron(expr).is_ok(), "{expr} should be valid");
        }
    }

    #[test]
    fn cron_validation_rejects_bad_forms() {
        let (_s, tool) = tool();
        // wrong field counts
        assert!(tool.validate_cron("* * * *").is_err());
        assert!(tool.validate_cron("* * * * * *").is_err());
        // out-of-range values
        assert!(tool.validate_cron("60 * * * *").is_err());
        assert!(tool.validate_cron("* 24 * * *").is_err());
        assert!(tool.validate_cron("* * 0 * *").is_err());
        assert!(tool.validate_cron("* * * 13 *").is_err());
        assert!(tool.validate_cron("* * * * 8").is_err());
        // malformed fields
        assert!(tool.validate_cron("a * * * *").is_err());
        assert!(tool.validate_cron("1..5 * * * *").is_err());
    }

    #[tokio::test]
    async fn create_persists_under_schedules_prefix() {
        let (storage, tool) = tool();
        let outcome = tool
            .perform(&input(serde_json::json!({
                "action": "create",
                "name": "nightly-report",
                "cron": "0 3 * * *",
                "task": "Summarize yesterday's audit log"
            })))
            .await;
        assert!(!outcome.is_error, "{}", outcome.output);

        let keys = storage.list(SCHEDULE_PREFIX).await.unwrap();
        assert_eq!(keys.len(), 1);
        let entry: ScheduleEntry =
            serde_json::from_slice(&storage.get(&keys[0]).await.unwrap().unwrap()).unwrap();
        assert_eq!(entry.name, "nightly-report");
        assert_eq!(entry.agent_name, "Test Agent");
        assert!(entry.enabled);
        assert_eq!(entry.id.len(), 8);
    }

    #[tokio::test]
    async fn pause_and_resume_flip_enabled() {
        let (storage, tool) = tool();
        tool.perform(&input(serde_json::json!({
            "action": "create",
            "name": "job",
            "cron": "* * * * *",
            "task": "tick"
        })))
        .await;
        let key = storage.list(SCHEDULE_PREFIX).await.unwrap().remove(0);
        let entry: ScheduleEntry =
            serde_json::from_slice(&storage.get(&key).await.unwrap().unwrap()).unwrap();

        let outcome = tool
            .perform(&input(serde_json::json!({"action": "pause", "id": entry.id})))
            .await;
        assert!(!outcome.is_error);
        let paused: ScheduleEntry =
            serde_json::from_slice(&storage.get(&key).await.unwrap().unwrap()).unwrap();
        assert!(!paused.enabled);

        tool.perform(&input(serde_json::json!({"action": "resume", "id": entry.id})))
            .await;
        let resumed: ScheduleEntry =
            serde_json::from_slice(&storage.get(&key).await.unwrap().unwrap()).unwrap();
        assert!(resumed.enabled);
    }

    #[tokio::test]
    async fn invalid_cron_is_rejected_on_create() {
        let (storage, tool) = tool();
        let outcome = tool
            .perform(&input(serde_json::json!({
                "action": "create",
                "name": "bad",
                "cron": "every 5 minutes",
                "task": "x"
            })))
            .await;
        assert!(outcome.is_error);
        assert!(storage.list(SCHEDULE_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_serialization_is_camel_case() {
        let entry = ScheduleEntry {
            id: "deadbeef".into(),
            name: "n".into(),
            cron: "* * * * *".into(),
            task: "t".into(),
            agent_name: "A".into(),
            enabled: true,
            created_at: Utc::now(),
            last_run: None,
            last_result: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("agentName").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("lastRun").is_none());
    }
}
