//! [`GateConfig`] – every operator-tunable knob of the gate.
//!
//! All fields are defaulted, so an empty (or absent) `hookgate.toml` yields
//! the stock policy set. Pattern tables are ordered lists of
//! `(pattern, action, message)` rules; the first matching rule decides.
//!
//! ```toml
//! control_dir = ".claude"
//!
//! [recitation]
//! warn_at = 3
//! block_at = 5
//!
//! [[dangerous_commands]]
//! pattern = 'terraform\s+destroy'
//! message = "Infrastructure teardown"
//! ```

use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hookgate_types::Severity;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What a matching pattern rule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Block,
    Warn,
    /// Stop scanning the table and let the request through this policy.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    #[serde(default)]
    pub action: RuleAction,
    pub message: String,
}

impl PatternRule {
    fn block(pattern: &str, message: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            action: RuleAction::Block,
            message: message.to_string(),
        }
    }

    fn allow(pattern: &str, message: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            action: RuleAction::Allow,
            message: message.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A session older than this starts over.
    pub stale_window_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stale_window_secs: 4 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TddConfig {
    /// How long a recorded test run satisfies the commit gate.
    pub ttl_secs: u64,
    /// Commands recognised as test-runner invocations (case-insensitive).
    pub test_runners: Vec<String>,
}

impl Default for TddConfig {
    fn default() -> Self {
        let runners = [
            r"npm\s+(run\s+)?test",
            r"yarn\s+(run\s+)?test",
            r"pnpm\s+(run\s+)?test",
            r"pytest",
            r"jest",
            r"mocha",
            r"vitest",
            r"cargo\s+test",
            r"go\s+test",
            r"dotnet\s+test",
            r"mvn\s+test",
            r"gradle\s+test",
        ];
        Self {
            ttl_secs: 15 * 60,
            test_runners: runners.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecitationConfig {
    pub warn_at: u64,
    pub block_at: u64,
    /// File name whose write counts as a recitation.
    pub artifact: String,
    pub log_cap: usize,
}

impl Default for RecitationConfig {
    fn default() -> Self {
        Self {
            warn_at: 3,
            block_at: 5,
            artifact: "activeContext.md".to_string(),
            log_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultationConfig {
    pub window_secs: u64,
    pub log_cap: usize,
    pub commit: Vec<String>,
    pub push: Vec<String>,
    pub merge: Vec<String>,
    /// Roles recognised inside an agent prompt when the host does not name one.
    pub known_agents: Vec<String>,
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            window_secs: 24 * 60 * 60,
            log_cap: 100,
            commit: owned(&["qa-engineer"]),
            push: owned(&["architect", "security-auditor"]),
            merge: owned(&["architect", "security-auditor"]),
            known_agents: owned(&[
                "qa-engineer",
                "security-auditor",
                "architect",
                "code-reviewer",
                "product-manager",
                "devops-engineer",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Path segment that introduces a feature name (`<marker>/<feature>/…`).
    pub feature_marker: String,
    /// PRD directory, relative to the control directory.
    pub prd_dir: String,
    /// Epic directory, relative to the control directory.
    pub epic_dir: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            feature_marker: "feature".to_string(),
            prd_dir: "prds".to_string(),
            epic_dir: "epics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Worktree deletion needs a memory sync younger than this.
    pub max_age_secs: u64,
    pub worktree_deletion: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 60 * 60,
            worktree_deletion: vec![
                r"git\s+worktree\s+remove".to_string(),
                r"cleanup-worktree\.sh".to_string(),
                r"rm\s+-rf.*worktree".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub warn_tokens: u64,
    pub critical_tokens: u64,
    pub chars_per_token: u64,
    /// Estimated tokens left after a compaction.
    pub compaction_baseline: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            warn_tokens: 25_000,
            critical_tokens: 35_000,
            chars_per_token: 4,
            compaction_baseline: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file name inside the control directory.
    pub file_name: String,
    pub busy_timeout_ms: u64,
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: "hookgate.db".to_string(),
            busy_timeout_ms: 250,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub min_severity: Severity,
    pub terminal: bool,
    pub terminal_bell: bool,
    pub log_to_file: bool,
    /// Log file name inside the control directory.
    pub log_file: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: Severity::Warning,
            terminal: true,
            terminal_bell: true,
            log_to_file: true,
            log_file: ".notifications.log".to_string(),
        }
    }
}

/// Append-only record of every tool call seen by `post`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLogConfig {
    pub enabled: bool,
    /// File name inside the control directory.
    pub file_name: String,
}

impl Default for UsageLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: ".tool_usage.log".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GateConfig
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// The tool's own directory; writes below it are never "real work".
    pub control_dir: String,
    pub session: SessionConfig,
    pub tdd: TddConfig,
    pub recitation: RecitationConfig,
    pub consultation: ConsultationConfig,
    pub governance: GovernanceConfig,
    pub sync: SyncConfig,
    pub context: ContextConfig,
    pub store: StoreConfig,
    pub notifications: NotificationConfig,
    pub usage_log: UsageLogConfig,
    /// Suggestion attached to every restricted-file block.
    pub restricted_file_suggestion: String,
    pub restricted_files: Vec<PatternRule>,
    pub dangerous_commands: Vec<PatternRule>,
    pub restricted_git: Vec<PatternRule>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            control_dir: ".claude".to_string(),
            session: SessionConfig::default(),
            tdd: TddConfig::default(),
            recitation: RecitationConfig::default(),
            consultation: ConsultationConfig::default(),
            governance: GovernanceConfig::default(),
            sync: SyncConfig::default(),
            context: ContextConfig::default(),
            store: StoreConfig::default(),
            notifications: NotificationConfig::default(),
            usage_log: UsageLogConfig::default(),
            restricted_file_suggestion: "If you need to modify environment variables, edit \
                'shared-config/.env.template' instead and regenerate the worktree .env file."
                .to_string(),
            restricted_files: default_restricted_files(),
            dangerous_commands: default_dangerous_commands(),
            restricted_git: default_restricted_git(),
        }
    }
}

impl GateConfig {
    pub fn stale_window(&self) -> Duration {
        secs(self.session.stale_window_secs)
    }

    pub fn tdd_ttl(&self) -> Duration {
        secs(self.tdd.ttl_secs)
    }

    pub fn consultation_window(&self) -> Duration {
        secs(self.consultation.window_secs)
    }

    pub fn sync_max_age(&self) -> Duration {
        secs(self.sync.max_age_secs)
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store.busy_timeout_ms)
    }

    /// Reject settings that would make a policy meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("control_dir must not be empty".into()));
        }
        if self.recitation.warn_at > self.recitation.block_at {
            return Err(ConfigError::Invalid(format!(
                "recitation.warn_at ({}) exceeds recitation.block_at ({})",
                self.recitation.warn_at, self.recitation.block_at
            )));
        }
        if self.context.chars_per_token == 0 {
            return Err(ConfigError::Invalid("context.chars_per_token must be positive".into()));
        }
        for (name, value) in [
            ("session.stale_window_secs", self.session.stale_window_secs),
            ("tdd.ttl_secs", self.tdd.ttl_secs),
            ("consultation.window_secs", self.consultation.window_secs),
            ("sync.max_age_secs", self.sync.max_age_secs),
        ] {
            if value > MAX_WINDOW_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} ({value}) exceeds the maximum of {MAX_WINDOW_SECS} seconds"
                )));
            }
        }
        Ok(())
    }
}

/// Upper bound for every time window: ten years.
pub const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Saturates instead of panicking; `validate` keeps real configs far below.
fn secs(s: u64) -> Duration {
    i64::try_from(s)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn default_restricted_files() -> Vec<PatternRule> {
    vec![
        PatternRule::allow(r"\.env\.template$", "editable environment template"),
        PatternRule::block(r"\.env$", "environment file"),
        PatternRule::block(r"\.env\.", "environment file variant"),
        PatternRule::block(r"\.git/", "git internals"),
        PatternRule::block(r"\.bare/", "bare repository metadata"),
        PatternRule::block(r"package-lock\.json$", "lockfile (use npm install instead)"),
        PatternRule::block(r"yarn\.lock$", "lockfile"),
        PatternRule::block(r"pnpm-lock\.yaml$", "lockfile"),
        PatternRule::block(r"composer\.lock$", "lockfile"),
        PatternRule::block(r"Gemfile\.lock$", "lockfile"),
        PatternRule::block(r"\.aws/credentials", "cloud credentials"),
        PatternRule::block(r"\.ssh/id_", "SSH private key"),
        PatternRule::block(r"\.gnupg/", "GPG keyring"),
        PatternRule::block(r"node_modules/", "dependency tree"),
    ]
}

fn default_dangerous_commands() -> Vec<PatternRule> {
    vec![
        PatternRule::block(r"rm\s+-rf\s+/", "Recursive force delete from root"),
        PatternRule::block(r"rm\s+-rf\s+\*", "Recursive force delete with wildcard"),
        PatternRule::block(r"rm\s+-rf\s+~", "Recursive force delete from home"),
        PatternRule::block(r"rm\s+-rf\s+\.\./", "Recursive force delete of parent directory"),
        PatternRule::block(r"mkfs", "Filesystem formatting (potential data loss)"),
        PatternRule::block(r"dd\s+if=.*of=/dev/", "Direct disk write (potential data loss)"),
        PatternRule::block(r":\(\)\{.*:\|:.*\};:", "Fork bomb pattern"),
        PatternRule::block(r"wget\s+.*\|\s*bash", "Remote code execution via wget"),
        PatternRule::block(r"curl\s+.*\|\s*bash", "Remote code execution via curl"),
        PatternRule::block(r"curl\s+.*\|\s*sh", "Remote code execution via curl"),
        PatternRule::block(r"eval\s+\$\(curl", "Remote code execution via eval"),
        PatternRule::block(r"chmod\s+777", "Overly permissive file permissions"),
        PatternRule::block(r"chown\s+-R\s+.*:.*\s+/", "Recursive ownership change from root"),
        PatternRule::block(r"git\s+push\s+.*--force", "Force push (potential data loss)"),
        PatternRule::block(r"git\s+reset\s+--hard\s+HEAD~", "Hard reset (potential data loss)"),
        PatternRule::block(r"npm\s+install\s+-g", "Global npm install (use local dependencies)"),
        PatternRule::block(r"sudo\s+rm", "Sudo with rm (dangerous)"),
        PatternRule::block(r">\s*/dev/sd", "Direct write to disk device"),
    ]
}

fn default_restricted_git() -> Vec<PatternRule> {
    vec![
        PatternRule::block(r"git\s+remote\s+add", "git remote add"),
        PatternRule::block(r"git\s+remote\s+set-url", "git remote set-url"),
        PatternRule::block(r"git\s+gc", "git gc"),
        PatternRule::block(r"git\s+prune", "git prune"),
        PatternRule::block(r"git\s+worktree\s+prune", "git worktree prune"),
        PatternRule::block(r"git\s+config\s+--global", "git config --global"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GateConfig::default().validate().unwrap();
    }

    #[test]
    fn default_thresholds_match_protocol() {
        let cfg = GateConfig::default();
        assert_eq!(cfg.stale_window(), Duration::hours(4));
        assert_eq!(cfg.tdd_ttl(), Duration::minutes(15));
        assert_eq!(cfg.consultation_window(), Duration::hours(24));
        assert_eq!(cfg.recitation.warn_at, 3);
        assert_eq!(cfg.recitation.block_at, 5);
        assert_eq!(cfg.consultation.log_cap, 100);
    }

    #[test]
    fn inverted_recitation_thresholds_are_rejected() {
        let mut cfg = GateConfig::default();
        cfg.recitation.warn_at = 6;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let mut cfg = GateConfig::default();
        cfg.session.stale_window_secs = 10_000_000_000_000_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(m)) if m.contains("stale_window_secs")));

        let mut cfg = GateConfig::default();
        cfg.tdd.ttl_secs = MAX_WINDOW_SECS + 1;
        assert!(cfg.validate().is_err());

        cfg.tdd.ttl_secs = MAX_WINDOW_SECS;
        cfg.validate().unwrap();
    }

    #[test]
    fn huge_windows_saturate_instead_of_panicking() {
        let mut cfg = GateConfig::default();
        cfg.session.stale_window_secs = 10_000_000_000_000_000;
        cfg.tdd.ttl_secs = u64::MAX;
        assert_eq!(cfg.stale_window(), Duration::MAX);
        assert_eq!(cfg.tdd_ttl(), Duration::MAX);
    }

    #[test]
    fn empty_control_dir_is_rejected() {
        let cfg = GateConfig {
            control_dir: " ".into(),
            ..GateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pattern_rule_action_defaults_to_block() {
        let rule: PatternRule =
            serde_json::from_str(r#"{"pattern":"x","message":"m"}"#).unwrap();
        assert_eq!(rule.action, RuleAction::Block);
    }
}
