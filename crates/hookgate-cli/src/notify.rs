//! Notifier sinks: a coloured stderr banner and a JSON-lines log file,
//! fanned out behind a severity filter.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::warn;

use hookgate_kernel::config::NotificationConfig;
use hookgate_types::{Notifier, Severity};

/// Prints a banner to stderr; stdout belongs to the hook protocol.
pub struct TerminalNotifier {
    bell: bool,
}

impl TerminalNotifier {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        let tag = format!("[{}]", severity.to_string().to_uppercase());
        let tag = match severity {
            Severity::Info => tag.cyan(),
            Severity::Warning => tag.yellow(),
            Severity::Error => tag.red(),
            Severity::Critical => tag.red().bold().reversed(),
        };
        let bell = if self.bell && severity >= Severity::Error { "\x07" } else { "" };
        eprintln!("{bell}{tag} {}", title.bold());
        eprintln!("  {message}");
    }
}

/// One line of the notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<Utc>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Appends one JSON object per notification.
pub struct LogFileNotifier {
    path: PathBuf,
}

impl LogFileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

/// Append `entry` as one JSON line, creating parent directories as needed.
pub(crate) fn append_json_line<T: Serialize>(path: &Path, entry: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

impl Notifier for LogFileNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            title: title.to_string(),
            message: message.to_string(),
            severity,
        };
        if let Err(e) = append_json_line(&self.path, &entry) {
            warn!(path = %self.path.display(), error = %e, "failed to write notification log");
        }
    }
}

/// Forwards to every sink at or above `min_severity`.
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn Notifier>>,
    min_severity: Severity,
}

impl FanoutNotifier {
    pub fn new(min_severity: Severity) -> Self {
        Self {
            sinks: Vec::new(),
            min_severity,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// The sinks `config` enables, writing the log under `control_dir`.
    pub fn from_config(config: &NotificationConfig, control_dir: PathBuf) -> Self {
        let mut fanout = Self::new(config.min_severity);
        if !config.enabled {
            return fanout;
        }
        if config.terminal {
            fanout = fanout.with_sink(Box::new(TerminalNotifier::new(config.terminal_bell)));
        }
        if config.log_to_file {
            fanout = fanout.with_sink(Box::new(LogFileNotifier::new(control_dir.join(&config.log_file))));
        }
        fanout
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        if severity < self.min_severity {
            return;
        }
        for sink in &self.sinks {
            sink.notify(title, message, severity);
        }
    }
}
