//! Policy decision domain types.
//!
//! Every mediated action is classified as one `PolicyAction` and evaluated
//! against a single decision point before execution. The engine itself lives
//! in the security crate; these are the value objects that cross the seam.

use serde::{Deserialize, Serialize};

/// The kind of side effect a tool wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    FileRead,
    FileWrite,
    Command,
    HttpRequest,
    SshExec,
    Git,
    Vault,
    Schedule,
}

impl PolicyAction {
    /// The snake_case wire/audit name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileRead => "file_read",
            Self::FileWrite => "file_write",
            Self::Command => "command",
            Self::HttpRequest => "http_request",
            Self::SshExec => "ssh_exec",
            Self::Git => "git",
            Self::Vault => "vault",
            Self::Schedule => "schedule",
        }
    }
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of evaluating one (action, target) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the action may proceed
    pub allowed: bool,

    /// Human-readable denial reason (present iff denied)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Source strings of every dangerous pattern that matched (commands only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_patterns: Vec<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            matched_patterns: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            matched_patterns: Vec::new(),
        }
    }

    pub fn deny_matched(reason: impl Into<String>, matched_patterns: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            matched_patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_are_snake_case() {
        assert_eq!(PolicyAction::FileRead.to_string(), "file_read");
        assert_eq!(PolicyAction::HttpRequest.to_string(), "http_request");
        assert_eq!(PolicyAction::SshExec.to_string(), "ssh_exec");
    }

    #[test]
    fn decision_serialization_omits_empty_fields() {
        let json = serde_json::to_string(&PolicyDecision::allow()).unwrap();
        assert!(!json.contains("reason"));
        assert!(!json.contains("matched_patterns"));

        let denied = PolicyDecision::deny_matched("Dangerous command", vec!["rm -rf /".into()]);
        let json = serde_json::to_string(&denied).unwrap();
        assert!(json.contains("Dangerous command"));
        assert!(json.contains("rm -rf /"));
    }
}
