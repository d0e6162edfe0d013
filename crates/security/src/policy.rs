//! The policy decision point.
//!
//! Stateless: constructed once from a `PolicyConfig`, then `evaluate` is a
//! pure function over (action, target). Command screening is textual on
//! purpose — patterns match anywhere in the command string, because shell
//! expansion makes argument parsing unreliable as a security boundary. The
//! false-positive cost is accepted.

use regex::RegexBuilder;
use tamalebot_config::PolicyConfig;
use tamalebot_core::{PolicyAction, PolicyDecision};
use tracing::warn;
use url::Url;

/// Evaluates proposed actions against a compiled policy.
pub struct PolicyEngine {
    config: PolicyConfig,
    patterns: Vec<regex::Regex>,
    home: String,
}

impl PolicyEngine {
    /// Compile a policy. Invalid dangerous-command patterns are dropped with
    /// a warning rather than failing construction.
    pub fn new(config: PolicyConfig, home: impl Into<String>) -> Self {
        let patterns = config
            .dangerous_patterns
            .iter()
            .filter_map(|p| {
                match RegexBuilder::new(p).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(pattern = %p, error = %e, "Dropping invalid dangerous-command pattern");
                        None
                    }
                }
            })
            .collect();
        Self {
            config,
            patterns,
            home: home.into(),
        }
    }

    /// The name of the underlying policy.
    pub fn policy_name(&self) -> &str {
        &self.config.name
    }

    /// Request rate limit for the hosting layer, if configured.
    pub fn max_requests_per_hour(&self) -> Option<u32> {
        self.config.max_requests_per_hour
    }

    /// Decide whether `target` may be acted on as `action`.
    pub fn evaluate(&self, action: PolicyAction, target: &str) -> PolicyDecision {
        match action {
            PolicyAction::FileRead => self.check_file_read(target),
            PolicyAction::FileWrite => self.check_file_write(target),
            PolicyAction::Command => self.check_command(target),
            PolicyAction::HttpRequest => self.check_http(target),
            PolicyAction::SshExec => self.check_ssh(target),
            PolicyAction::Git => self.check_git(target),
            // Mediation for these happens inside the tool itself.
            PolicyAction::Vault | PolicyAction::Schedule => PolicyDecision::allow(),
        }
    }

    fn expand_home(&self, path: &str) -> String {
        match path.strip_prefix('~') {
            Some(rest) => format!("{}{rest}", self.home),
            None => path.to_string(),
        }
    }

    fn check_file_read(&self, path: &str) -> PolicyDecision {
        let expanded = self.expand_home(path);
        for entry in &self.config.blocked_read_paths {
            let blocked = self.expand_home(entry);
            if blocked.ends_with('/') {
                if expanded.starts_with(&blocked) {
                    return PolicyDecision::deny(format!(
                        "Access to sensitive directory denied: {blocked}"
                    ));
                }
            } else if expanded == blocked {
                return PolicyDecision::deny(format!("Access to sensitive file denied: {blocked}"));
            }
        }
        PolicyDecision::allow()
    }

    fn check_file_write(&self, path: &str) -> PolicyDecision {
        let expanded = self.expand_home(path);
        for entry in &self.config.blocked_write_paths {
            let blocked = self.expand_home(entry);
            if expanded.starts_with(&blocked) {
                return PolicyDecision::deny(format!(
                    "Writing to protected path denied: {blocked}"
                ));
            }
        }
        PolicyDecision::allow()
    }

    fn check_command(&self, command: &str) -> PolicyDecision {
        let matched: Vec<String> = self
            .patterns
            .iter()
            .filter(|re| re.is_match(command))
            .map(|re| re.as_str().to_string())
            .collect();

        if matched.is_empty() {
            return PolicyDecision::allow();
        }

        let shown: Vec<&str> = matched.iter().take(2).map(String::as_str).collect();
        let suffix = if matched.len() > 2 { ", …" } else { "" };
        PolicyDecision::deny_matched(
            format!("Dangerous command pattern matched: {}{suffix}", shown.join(", ")),
            matched,
        )
    }

    fn check_http(&self, target: &str) -> PolicyDecision {
        if self.config.allowed_domains.is_empty() {
            return PolicyDecision::allow();
        }

        let host = match Url::parse(target) {
            Ok(url) => match url.host_str() {
                Some(h) => h.to_string(),
                None => return PolicyDecision::deny("Invalid URL"),
            },
            Err(_) => return PolicyDecision::deny("Invalid URL"),
        };

        if self
            .config
            .allowed_domains
            .iter()
            .any(|d| host_matches(&host, d))
        {
            PolicyDecision::allow()
        } else {
            PolicyDecision::deny(format!("Domain not in allow-list: {host}"))
        }
    }

    fn check_ssh(&self, target: &str) -> PolicyDecision {
        if self.config.allowed_ssh_hosts.is_empty() {
            return PolicyDecision::allow();
        }

        // Target format: user@host:port
        let after_user = target.rsplit('@').next().unwrap_or(target);
        let host = after_user.split(':').next().unwrap_or(after_user);

        if self
            .config
            .allowed_ssh_hosts
            .iter()
            .any(|h| host_matches(host, h))
        {
            PolicyDecision::allow()
        } else {
            PolicyDecision::deny(format!("SSH host not in allow-list: {host}"))
        }
    }

    fn check_git(&self, target: &str) -> PolicyDecision {
        // Target format: "action  repo-or-path"
        let repo = target
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");

        // Local paths are governed by file policy, not the repo allow-list.
        let looks_remote =
            repo.contains("://") || repo.contains('@') || repo.contains("github.com");
        if !looks_remote || self.config.allowed_repos.is_empty() {
            return PolicyDecision::allow();
        }

        if self.config.allowed_repos.iter().any(|r| repo.contains(r)) {
            PolicyDecision::allow()
        } else {
            PolicyDecision::deny(format!("Repository not in allow-list: {repo}"))
        }
    }
}

/// Exact hostname match, or suffix match at a label boundary
/// (`api.example.com` matches allowed entry `example.com`, `evilexample.com`
/// does not).
fn host_matches(host: &str, allowed: &str) -> bool {
    host == allowed || host.ends_with(&format!(".{allowed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: PolicyConfig) -> PolicyEngine {
        PolicyEngine::new(config, "/home/agent")
    }

    #[test]
    fn decisions_are_deterministic() {
        let e = engine(PolicyConfig::default());
        let a = e.evaluate(PolicyAction::Command, "rm -rf / --no-preserve-root");
        let b = e.evaluate(PolicyAction::Command, "rm -rf / --no-preserve-root");
        assert_eq!(a, b);
        assert!(!a.allowed);
    }

    #[test]
    fn blocked_read_file_and_directory() {
        let mut config = PolicyConfig::default();
        config.blocked_read_paths = vec!["/etc/shadow".into(), "~/.ssh/".into()];
        let e = engine(config);

        let file = e.evaluate(PolicyAction::FileRead, "/etc/shadow");
        assert!(!file.allowed);
        assert!(file.reason.as_deref().unwrap().contains("sensitive file"));

        let dir = e.evaluate(PolicyAction::FileRead, "~/.ssh/id_ed25519");
        assert!(!dir.allowed);
        assert!(dir.reason.as_deref().unwrap().contains("sensitive directory"));

        // Tilde expansion applies to the target too
        let expanded = e.evaluate(PolicyAction::FileRead, "/home/agent/.ssh/id_ed25519");
        assert!(!expanded.allowed);

        assert!(e.evaluate(PolicyAction::FileRead, "/etc/hostname").allowed);
    }

    #[test]
    fn blocked_write_prefix() {
        let e = engine(PolicyConfig::default());
        assert!(!e.evaluate(PolicyAction::FileWrite, "/etc/passwd").allowed);
        assert!(!e.evaluate(PolicyAction::FileWrite, "/usr/bin/evil").allowed);
        assert!(e.evaluate(PolicyAction::FileWrite, "/tmp/notes.txt").allowed);
    }

    #[test]
    fn command_pattern_matches_anywhere() {
        let e = engine(PolicyConfig::default());

        // Textual matching is deliberately over-conservative: the prefix
        // pattern catches a path that a shell parser would consider safe.
        let d = e.evaluate(PolicyAction::Command, "rm -rf /tmp/workspace/old_files");
        assert!(!d.allowed);
        assert!(!d.matched_patterns.is_empty());

        let d = e.evaluate(PolicyAction::Command, "echo RM -RF / is bad");
        assert!(!d.allowed, "matching is case-insensitive");

        assert!(e.evaluate(PolicyAction::Command, "ls -la").allowed);
    }

    #[test]
    fn command_reason_caps_listed_patterns_at_two() {
        let mut config = PolicyConfig::default();
        config.dangerous_patterns = vec!["foo".into(), "fo+".into(), "f.o".into()];
        let e = engine(config);
        let d = e.evaluate(PolicyAction::Command, "foo");
        assert_eq!(d.matched_patterns.len(), 3);
        let reason = d.reason.unwrap();
        assert!(reason.contains("foo"));
        assert!(reason.contains("…"));
    }

    #[test]
    fn invalid_patterns_are_dropped() {
        let mut config = PolicyConfig::default();
        config.dangerous_patterns = vec!["[unclosed".into(), "rm -rf".into()];
        let e = engine(config);
        assert_eq!(e.patterns.len(), 1);
        assert!(!e.evaluate(PolicyAction::Command, "rm -rf stuff").allowed);
    }

    #[test]
    fn http_allow_list() {
        let mut config = PolicyConfig::default();
        config.allowed_domains = vec!["api.anthropic.com".into(), "api.openai.com".into()];
        let e = engine(config);

        let ok = e.evaluate(PolicyAction::HttpRequest, "https://api.anthropic.com/v1/messages");
        assert!(ok.allowed);

        let denied = e.evaluate(PolicyAction::HttpRequest, "https://evil.com/exfil");
        assert!(!denied.allowed);
        assert!(denied.reason.as_deref().unwrap().contains("evil.com"));
    }

    #[test]
    fn http_empty_allow_list_is_open() {
        let e = engine(PolicyConfig::default());
        assert!(e.evaluate(PolicyAction::HttpRequest, "https://anywhere.example").allowed);
    }

    #[test]
    fn http_suffix_match_is_label_bounded() {
        let mut config = PolicyConfig::default();
        config.allowed_domains = vec!["example.com".into()];
        let e = engine(config);
        assert!(e.evaluate(PolicyAction::HttpRequest, "https://api.example.com/x").allowed);
        assert!(!e.evaluate(PolicyAction::HttpRequest, "https://evilexample.com/x").allowed);
    }

    #[test]
    fn http_unparseable_url_denied() {
        let mut config = PolicyConfig::default();
        config.allowed_domains = vec!["example.com".into()];
        let e = engine(config);
        let d = e.evaluate(PolicyAction::HttpRequest, "not a url at all");
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("Invalid URL"));
    }

    #[test]
    fn ssh_host_extraction() {
        let mut config = PolicyConfig::default();
        config.allowed_ssh_hosts = vec!["prod.example.com".into()];
        let e = engine(config);

        assert!(e.evaluate(PolicyAction::SshExec, "root@prod.example.com:22").allowed);
        assert!(e.evaluate(PolicyAction::SshExec, "deploy@db.prod.example.com:2222").allowed);
        let d = e.evaluate(PolicyAction::SshExec, "root@evil.com:22");
        assert!(!d.allowed);
        assert!(d.reason.as_deref().unwrap().contains("evil.com"));
    }

    #[test]
    fn git_allow_list_only_applies_to_remote_targets() {
        let mut config = PolicyConfig::default();
        config.allowed_repos = vec!["github.com/tamalebot".into()];
        let e = engine(config);

        assert!(e.evaluate(PolicyAction::Git, "status /tmp/work/repo").allowed);
        assert!(
            e.evaluate(PolicyAction::Git, "clone https://github.com/tamalebot/core.git")
                .allowed
        );
        assert!(
            !e.evaluate(PolicyAction::Git, "clone https://github.com/attacker/evil.git")
                .allowed
        );
        assert!(
            !e.evaluate(PolicyAction::Git, "push git@gitlab.com:other/repo.git")
                .allowed
        );
    }

    #[test]
    fn vault_and_schedule_always_allowed() {
        let e = engine(PolicyConfig::strict());
        assert!(e.evaluate(PolicyAction::Vault, "vault_set ANYTHING").allowed);
        assert!(e.evaluate(PolicyAction::Schedule, "create nightly").allowed);
    }
}
