//! Security policy configuration.
//!
//! Lists follow the allow/block convention used across the runtime: an empty
//! allow-list means "no restriction", an empty block-list means "no block".

use serde::{Deserialize, Serialize};

/// Configuration for the policy decision point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Name of this policy (for logs and config lookup)
    pub name: String,

    /// Paths the agent may never read. Entries ending in `/` block the whole
    /// directory; other entries block exactly that file.
    #[serde(default)]
    pub blocked_read_paths: Vec<String>,

    /// Path prefixes the agent may never write under.
    #[serde(default)]
    pub blocked_write_paths: Vec<String>,

    /// Regular expressions matched case-insensitively anywhere in a command.
    #[serde(default)]
    pub dangerous_patterns: Vec<String>,

    /// Hostnames the agent may fetch from (exact or subdomain match).
    /// Empty = any host.
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Hosts the agent may open secure-shell sessions to. Empty = any host.
    #[serde(default)]
    pub allowed_ssh_hosts: Vec<String>,

    /// Substrings a remote repository URL must contain. Empty = any repo.
    #[serde(default)]
    pub allowed_repos: Vec<String>,

    /// Request rate limit for the hosting layer; the decision function does
    /// not consume it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests_per_hour: Option<u32>,
}

impl PolicyConfig {
    /// Look up a built-in policy by name, falling back to `default`.
    pub fn by_name(name: &str) -> Self {
        match name {
            "permissive" => Self::permissive(),
            "strict" => Self::strict(),
            _ => Self::default(),
        }
    }

    /// The standard policy: sensitive files and destructive commands blocked,
    /// network and repositories open.
    pub fn default_policy() -> Self {
        Self {
            name: "default".into(),
            blocked_read_paths: vec![
                "~/.ssh/".into(),
                "~/.aws/".into(),
                "~/.gnupg/".into(),
                "~/.config/gcloud/".into(),
                "/etc/shadow".into(),
                "/etc/sudoers".into(),
                "~/.bash_history".into(),
                "~/.zsh_history".into(),
            ],
            blocked_write_paths: vec![
                "/etc/".into(),
                "/usr/".into(),
                "/bin/".into(),
                "/sbin/".into(),
                "/boot/".into(),
                "~/.ssh/".into(),
            ],
            dangerous_patterns: vec![
                r"rm\s+-rf\s+/".into(),
                r"rm\s+-rf\s+~".into(),
                r"mkfs".into(),
                r"dd\s+if=.*of=/dev/".into(),
                r":\(\)\s*\{.*\}\s*;\s*:".into(),
                r"chmod\s+-R\s+777\s+/".into(),
                r">\s*/dev/sd".into(),
                r"shutdown".into(),
                r"reboot".into(),
                r"curl\s+.*\|\s*(ba)?sh".into(),
                r"wget\s+.*\|\s*(ba)?sh".into(),
            ],
            allowed_domains: Vec::new(),
            allowed_ssh_hosts: Vec::new(),
            allowed_repos: Vec::new(),
            max_requests_per_hour: None,
        }
    }

    /// Everything the default blocks plus closed network/ssh/repo lists that
    /// the operator is expected to fill in.
    pub fn strict() -> Self {
        let mut policy = Self::default_policy();
        policy.name = "strict".into();
        policy.blocked_read_paths.push("/etc/".into());
        policy.blocked_write_paths.push("/tmp/".into());
        policy
            .dangerous_patterns
            .extend(["sudo\\s".to_string(), "su\\s+-".to_string()]);
        policy.allowed_domains = vec!["api.anthropic.com".into(), "api.openai.com".into()];
        policy.max_requests_per_hour = Some(60);
        policy
    }

    /// Pattern checks only; no path or network restrictions.
    pub fn permissive() -> Self {
        Self {
            name: "permissive".into(),
            blocked_read_paths: Vec::new(),
            blocked_write_paths: Vec::new(),
            dangerous_patterns: vec![r"rm\s+-rf\s+/".into(), r"mkfs".into()],
            allowed_domains: Vec::new(),
            allowed_ssh_hosts: Vec::new(),
            allowed_repos: Vec::new(),
            max_requests_per_hour: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::default_policy()
    }
}
