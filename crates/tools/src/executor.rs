//! The mediated tool executor.
//!
//! Every invocation follows the same pipeline, in order:
//!
//! 1. resolve the tool (unknown name ⇒ error result)
//! 2. classify the call as (policy action, target) (bad input ⇒ error result)
//! 3. evaluate the policy
//! 4. write one audit entry — regardless of the outcome
//! 5. denied ⇒ `BLOCKED by security policy: …` error result
//! 6. otherwise perform the side effect
//!
//! Nothing here raises: the model always gets a result block back.

use std::collections::HashMap;
use std::sync::Arc;
use tamalebot_core::{LlmToolCall, Tool, ToolOutcome, ToolSchema};
use tamalebot_security::{AuditDecision, AuditJournal, PolicyEngine};
use tracing::{debug, warn};

/// Catalog of tools plus the mediation collaborators.
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
    policy: Arc<PolicyEngine>,
    audit: Arc<AuditJournal>,
}

impl ToolExecutor {
    pub fn new(policy: Arc<PolicyEngine>, audit: Arc<AuditJournal>) -> Self {
        Self {
            tools: HashMap::new(),
            policy,
            audit,
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// All tool schemas, for forwarding to the LLM.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Names of registered tools.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Run one tool call through the mediation pipeline.
    pub async fn execute(&self, call: &LlmToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool requested");
            return ToolOutcome::error(format!("Unknown tool: {}", call.name));
        };

        let (action, target) = match tool.action(&call.input) {
            Ok(pair) => pair,
            Err(message) => return ToolOutcome::error(message),
        };

        let decision = self.policy.evaluate(action, &target);
        let audit_decision = if decision.allowed {
            AuditDecision::Allowed
        } else {
            AuditDecision::Blocked
        };
        let metadata = if decision.matched_patterns.is_empty() {
            None
        } else {
            let mut map = serde_json::Map::new();
            map.insert(
                "matched_patterns".into(),
                serde_json::json!(decision.matched_patterns),
            );
            Some(map)
        };
        self.audit.log_soft(
            action.as_str(),
            &target,
            audit_decision,
            decision.reason.clone(),
            metadata,
        );

        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "denied".into());
            return ToolOutcome::error(format!("BLOCKED by security policy: {reason}"));
        }

        debug!(tool = %call.name, target = %target, "Executing tool");
        tool.perform(&call.input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tamalebot_config::PolicyConfig;
    use tamalebot_core::PolicyAction;
    use tamalebot_security::EntryFilter;

    struct FakeCommandTool;

    #[async_trait]
    impl Tool for FakeCommandTool {
        fn name(&self) -> &str {
            "fake_cmd"
        }
        fn description(&self) -> &str {
            "Pretends to run a command"
        }
        fn input_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"]
            })
        }
        fn action(&self, input: &Map<String, Value>) -> Result<(PolicyAction, String), String> {
            let command = input
                .get("command")
                .and_then(Value::as_str)
                .ok_or("Missing required input: command")?;
            Ok((PolicyAction::Command, command.to_string()))
        }
        async fn perform(&self, _input: &Map<String, Value>) -> ToolOutcome {
            ToolOutcome::ok("ran it")
        }
    }

    fn executor() -> (tempfile::TempDir, Arc<AuditJournal>, ToolExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditJournal::new(dir.path(), "test-agent").unwrap());
        let policy = Arc::new(PolicyEngine::new(PolicyConfig::default(), "/home/agent"));
        let mut executor = ToolExecutor::new(policy, audit.clone());
        executor.register(Box::new(FakeCommandTool));
        (dir, audit, executor)
    }

    fn call(name: &str, input: Value) -> LlmToolCall {
        LlmToolCall {
            id: "tool_1".into(),
            name: name.into(),
            input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn allowed_call_executes_and_audits() {
        let (_dir, audit, executor) = executor();
        let outcome = executor
            .execute(&call("fake_cmd", serde_json::json!({"command": "echo hi"})))
            .await;
        assert!(!outcome.is_error);
        assert_eq!(outcome.output, "ran it");

        let entries = audit.entries(&EntryFilter::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, "command");
        assert_eq!(entries[0].target, "echo hi");
    }

    #[tokio::test]
    async fn denied_call_is_blocked_and_audited() {
        let (_dir, audit, executor) = executor();
        let outcome = executor
            .execute(&call("fake_cmd", serde_json::json!({"command": "rm -rf /"})))
            .await;
        assert!(outcome.is_error);
        assert!(outcome.output.starts_with("BLOCKED by security policy:"));

        let entries = audit.entries(&EntryFilter {
            decision: Some(AuditDecision::Blocked),
            ..Default::default()
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, "command");
        assert!(entries[0].metadata.is_some(), "matched patterns recorded");
    }

    #[tokio::test]
    async fn unknown_tool_is_error_without_audit() {
        let (_dir, audit, executor) = executor();
        let outcome = executor.execute(&call("nope", serde_json::json!({}))).await;
        assert!(outcome.is_error);
        assert!(outcome.output.contains("Unknown tool"));
        assert!(audit.entries(&EntryFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn missing_input_is_error_before_policy() {
        let (_dir, audit, executor) = executor();
        let outcome = executor.execute(&call("fake_cmd", serde_json::json!({}))).await;
        assert!(outcome.is_error);
        assert!(outcome.output.contains("command"));
        assert!(audit.entries(&EntryFilter::default()).is_empty());
    }

    #[test]
    fn schemas_are_sorted_by_name() {
        let (_dir, _audit, executor) = executor();
        let schemas = executor.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "fake_cmd");
    }
}
