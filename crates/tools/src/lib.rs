//! Built-in tool implementations for Tamalebot.
//!
//! Tools give the agent the ability to act in the world: run shell commands,
//! read/write files, fetch pages, use credentials, reach remote hosts, drive
//! git, and manage schedules. Every invocation goes through the
//! [`ToolExecutor`], which asks the policy engine and writes an audit entry
//! before anything executes.

pub mod executor;
pub mod file_read;
pub mod file_write;
pub mod git;
pub mod schedule;
pub mod shell;
pub mod ssh_exec;
pub mod vault_tool;
pub mod web_browse;

mod args;
mod capture;
mod keyfile;

pub use executor::ToolExecutor;

use std::path::PathBuf;
use std::sync::Arc;
use tamalebot_security::{AuditJournal, CredentialVault, PolicyEngine};
use tamalebot_storage::StorageBackend;

/// Everything needed to assemble the standard tool catalog.
pub struct ToolSet {
    pub policy: Arc<PolicyEngine>,
    pub audit: Arc<AuditJournal>,
    pub agent_id: String,
    pub agent_name: String,
    pub workdir: PathBuf,
    /// Vault-backed tools (vault, ssh_exec, git deploy keys) need this.
    pub vault: Option<Arc<CredentialVault>>,
    /// The schedule tool needs a storage backend.
    pub storage: Option<Arc<dyn StorageBackend>>,
}

/// Build an executor with every tool the configuration supports.
///
/// Vault and schedule tools are only registered when their collaborators are
/// present; the rest of the catalog is always available.
pub fn build_executor(set: ToolSet) -> ToolExecutor {
    let mut executor = ToolExecutor::new(set.policy, set.audit);

    executor.register(Box::new(shell::ShellTool::new(
        set.workdir.clone(),
        set.agent_id.clone(),
    )));
    executor.register(Box::new(file_read::FileReadTool));
    executor.register(Box::new(file_write::FileWriteTool));
    executor.register(Box::new(web_browse::WebBrowseTool::new()));

    if let Some(vault) = &set.vault {
        executor.register(Box::new(vault_tool::VaultTool::new(vault.clone())));
        executor.register(Box::new(ssh_exec::SshExecTool::new(vault.clone())));
    }
    executor.register(Box::new(git::GitTool::new(set.workdir, set.vault)));

    if let Some(storage) = set.storage {
        executor.register(Box::new(schedule::ScheduleTool::new(
            storage,
            set.agent_name,
        )));
    }

    executor
}
