//! Append-only log of the tool calls `post` has seen.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use hookgate_kernel::config::UsageLogConfig;
use hookgate_types::{ActionOutcome, ActionRequest};

use crate::notify::append_json_line;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    /// Bytes of the normalized request.
    pub input_size: usize,
    /// Bytes of captured output.
    pub output_size: usize,
}

impl UsageEntry {
    pub fn new(tool: &str, request: &ActionRequest, outcome: &ActionOutcome, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            tool: tool.to_string(),
            input_size: serde_json::to_string(request).map(|s| s.len()).unwrap_or(0),
            output_size: outcome.output.as_deref().map_or(0, str::len),
        }
    }
}

pub struct UsageLog {
    path: Option<PathBuf>,
}

impl UsageLog {
    pub fn from_config(config: &UsageLogConfig, control_dir: &std::path::Path) -> Self {
        Self {
            path: config.enabled.then(|| control_dir.join(&config.file_name)),
        }
    }

    /// Failures are logged and dropped; usage accounting never affects a reply.
    pub fn record(&self, entry: &UsageEntry) {
        let Some(path) = &self.path else { return };
        if let Err(e) = append_json_line(path, entry) {
            warn!(path = %path.display(), error = %e, "failed to write tool usage log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tool: &str) -> UsageEntry {
        let outcome = ActionOutcome {
            exit_code: Some(0),
            output: Some("ok\n".to_string()),
        };
        UsageEntry::new(tool, &ActionRequest::shell("cargo test"), &outcome, Utc::now())
    }

    #[test]
    fn entries_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let log = UsageLog::from_config(&UsageLogConfig::default(), dir.path());
        log.record(&entry("Bash"));
        log.record(&entry("Bash"));

        let raw = std::fs::read_to_string(dir.path().join(".tool_usage.log")).unwrap();
        let entries: Vec<UsageEntry> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tool, "Bash");
        assert_eq!(entries[0].output_size, 3);
        assert!(entries[0].input_size > "cargo test".len());
    }

    #[test]
    fn disabled_config_writes_nothing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let config = UsageLogConfig {
            enabled: false,
            ..UsageLogConfig::default()
        };
        UsageLog::from_config(&config, dir.path()).record(&entry("Bash"));
        assert!(!dir.path().join(".tool_usage.log").exists());
    }
}
