//! Append-only audit journal.
//!
//! One JSONL file per agent identifier. Every policy decision lands here
//! before the action executes; entries are immutable and ordered by append
//! time. The file handle is opened lazily with append semantics and held
//! until `close()`.
//!
//! The entry identifier is a content hash (timestamp:action:target), not a
//! chained hash — the journal is not tamper-evident.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tamalebot_core::AuditError;
use tracing::{debug, warn};

/// Outcome recorded for a mediated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDecision {
    Allowed,
    Blocked,
}

impl std::fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::Blocked => f.write_str("blocked"),
        }
    }
}

/// A single journal entry. Serialized camelCase on disk
/// (`entryId`, `agentId`, `actionType`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// ISO-8601 timestamp (the exact string hashed into `entry_id`)
    pub timestamp: String,

    /// First 16 hex chars of SHA-256 over `timestamp:action_type:target`
    pub entry_id: String,

    pub agent_id: String,
    pub action_type: String,
    pub target: String,
    pub decision: AuditDecision,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Filter for journal read-back.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Keep only the last N surviving entries (in insertion order)
    pub limit: Option<usize>,
    pub agent_id: Option<String>,
    pub decision: Option<AuditDecision>,
}

/// Append-only JSONL journal for one agent.
pub struct AuditJournal {
    path: PathBuf,
    agent_id: String,
    file: Mutex<Option<std::fs::File>>,
}

impl AuditJournal {
    /// Create a journal writing to `{dir}/{agent_id}.jsonl`. The directory is
    /// created if absent; the file is not opened until the first write.
    pub fn new(dir: impl Into<PathBuf>, agent_id: impl Into<String>) -> Result<Self, AuditError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AuditError::Io(format!("Failed to create audit directory: {e}")))?;
        let agent_id = agent_id.into();
        let path = dir.join(format!("{agent_id}.jsonl"));
        debug!(path = %path.display(), "Audit journal ready");
        Ok(Self {
            path,
            agent_id,
            file: Mutex::new(None),
        })
    }

    /// The agent this journal belongs to.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Append one entry. Returns the entry identifier.
    pub fn log(
        &self,
        action_type: &str,
        target: &str,
        decision: AuditDecision,
        reason: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, AuditError> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let entry_id = entry_id(&timestamp, action_type, target);

        let entry = AuditEntry {
            timestamp,
            entry_id: entry_id.clone(),
            agent_id: self.agent_id.clone(),
            action_type: action_type.to_string(),
            target: target.to_string(),
            decision,
            reason,
            metadata,
        };

        let mut line = serde_json::to_string(&entry)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut guard = self.file.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| AuditError::Io(format!("Failed to open audit file: {e}")))?;
            *guard = Some(file);
        }
        let Some(file) = guard.as_mut() else {
            return Err(AuditError::Io("Audit file handle unavailable".into()));
        };
        file.write_all(line.as_bytes())
            .map_err(|e| AuditError::Io(format!("Failed to append audit entry: {e}")))?;
        file.flush()
            .map_err(|e| AuditError::Io(format!("Failed to flush audit file: {e}")))?;

        Ok(entry_id)
    }

    /// Like [`log`](Self::log) but swallows journal failures with a warning.
    /// For callers whose own failure semantics must not depend on the disk.
    pub fn log_soft(
        &self,
        action_type: &str,
        target: &str,
        decision: AuditDecision,
        reason: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) {
        if let Err(e) = self.log(action_type, target, decision, reason, metadata) {
            warn!(action_type, target, error = %e, "Audit write failed");
        }
    }

    /// Read back entries, oldest first. Malformed lines are skipped; an
    /// absent file yields an empty list. With a limit, the *last* N
    /// surviving entries are kept, still in insertion order.
    pub fn entries(&self, filter: &EntryFilter) -> Vec<AuditEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<AuditEntry> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed audit line");
                    None
                }
            })
            .filter(|e| {
                filter
                    .agent_id
                    .as_ref()
                    .is_none_or(|id| &e.agent_id == id)
            })
            .filter(|e| filter.decision.is_none_or(|d| e.decision == d))
            .collect();

        if let Some(limit) = filter.limit
            && entries.len() > limit
        {
            entries.drain(..entries.len() - limit);
        }
        entries
    }

    /// Flush and release the file handle. Subsequent writes reopen it.
    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(mut file) = guard.take()
            && let Err(e) = file.flush()
        {
            warn!(error = %e, "Failed to flush audit file on close");
        }
    }
}

impl Drop for AuditJournal {
    fn drop(&mut self) {
        self.close();
    }
}

/// First 16 hex characters of SHA-256 over `timestamp:action:target`.
fn entry_id(timestamp: &str, action_type: &str, target: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(b":");
    hasher.update(action_type.as_bytes());
    hasher.update(b":");
    hasher.update(target.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> (tempfile::TempDir, AuditJournal) {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::new(dir.path(), "test-agent").unwrap();
        (dir, journal)
    }

    #[test]
    fn log_and_read_back_in_order() {
        let (_dir, journal) = journal();
        journal
            .log("command", "echo one", AuditDecision::Allowed, None, None)
            .unwrap();
        journal
            .log(
                "command",
                "rm -rf /",
                AuditDecision::Blocked,
                Some("Dangerous command".into()),
                None,
            )
            .unwrap();

        let entries = journal.entries(&EntryFilter::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target, "echo one");
        assert_eq!(entries[1].decision, AuditDecision::Blocked);
        assert_eq!(entries[1].reason.as_deref(), Some("Dangerous command"));
    }

    #[test]
    fn entry_id_is_hash_prefix_of_fields() {
        let (_dir, journal) = journal();
        let id = journal
            .log("file_read", "/tmp/x", AuditDecision::Allowed, None, None)
            .unwrap();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let entry = &journal.entries(&EntryFilter::default())[0];
        assert_eq!(
            entry.entry_id,
            entry_id(&entry.timestamp, &entry.action_type, &entry.target)
        );
    }

    #[test]
    fn filter_by_decision_and_limit() {
        let (_dir, journal) = journal();
        for i in 0..5 {
            let decision = if i % 2 == 0 {
                AuditDecision::Allowed
            } else {
                AuditDecision::Blocked
            };
            journal
                .log("command", &format!("cmd{i}"), decision, None, None)
                .unwrap();
        }

        let blocked = journal.entries(&EntryFilter {
            decision: Some(AuditDecision::Blocked),
            ..Default::default()
        });
        assert_eq!(blocked.len(), 2);

        let last_two = journal.entries(&EntryFilter {
            limit: Some(2),
            ..Default::default()
        });
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].target, "cmd3");
        assert_eq!(last_two[1].target, "cmd4");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::new(dir.path(), "agent-x").unwrap();
        journal
            .log("git", "status .", AuditDecision::Allowed, None, None)
            .unwrap();
        journal.close();

        // Corrupt the file by hand
        let path = dir.path().join("agent-x.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("this is not json\n");
        std::fs::write(&path, content).unwrap();

        let entries = journal.entries(&EntryFilter::default());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn absent_file_yields_empty() {
        let (_dir, journal) = journal();
        assert!(journal.entries(&EntryFilter::default()).is_empty());
    }

    #[test]
    fn close_then_write_reopens() {
        let (_dir, journal) = journal();
        journal
            .log("command", "a", AuditDecision::Allowed, None, None)
            .unwrap();
        journal.close();
        journal
            .log("command", "b", AuditDecision::Allowed, None, None)
            .unwrap();
        assert_eq!(journal.entries(&EntryFilter::default()).len(), 2);
    }

    #[test]
    fn metadata_roundtrips() {
        let (_dir, journal) = journal();
        let mut meta = Map::new();
        meta.insert("exit_code".into(), serde_json::json!(0));
        journal
            .log("command", "true", AuditDecision::Allowed, None, Some(meta))
            .unwrap();
        let entries = journal.entries(&EntryFilter::default());
        assert_eq!(entries[0].metadata.as_ref().unwrap()["exit_code"], 0);
    }
}
