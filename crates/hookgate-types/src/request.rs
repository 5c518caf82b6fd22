//! The action an agent proposes, and what happened once it ran.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a proposed action. Policies declare interest by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ActionKind {
    FileWrite,
    FileRead,
    ShellCommand,
    AgentInvocation,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::FileWrite => "FileWrite",
            ActionKind::FileRead => "FileRead",
            ActionKind::ShellCommand => "ShellCommand",
            ActionKind::AgentInvocation => "AgentInvocation",
        }
    }
}

/// One proposed action. Immutable; one per gate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action_kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_prompt: Option<String>,
    /// Reviewer role named explicitly by the host (e.g. a sub-agent type).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl ActionRequest {
    fn bare(action_kind: ActionKind) -> Self {
        Self {
            action_kind,
            file_path: None,
            command: None,
            agent_prompt: None,
            agent: None,
        }
    }

    pub fn file_write(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Self::bare(ActionKind::FileWrite)
        }
    }

    pub fn file_read(path: impl Into<String>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Self::bare(ActionKind::FileRead)
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::bare(ActionKind::ShellCommand)
        }
    }

    pub fn agent_invocation(agent: Option<String>, prompt: impl Into<String>) -> Self {
        Self {
            agent,
            agent_prompt: Some(prompt.into()),
            ..Self::bare(ActionKind::AgentInvocation)
        }
    }

    /// The file path, but only for file actions and only when non-empty.
    pub fn path(&self) -> Option<&str> {
        match self.action_kind {
            ActionKind::FileWrite | ActionKind::FileRead => {
                self.file_path.as_deref().filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }

    /// The shell command, but only for shell actions and only when non-empty.
    pub fn shell_command(&self) -> Option<&str> {
        match self.action_kind {
            ActionKind::ShellCommand => self.command.as_deref().filter(|c| !c.trim().is_empty()),
            _ => None,
        }
    }

    pub fn is_write(&self) -> bool {
        self.action_kind == ActionKind::FileWrite
    }

    pub fn is_read(&self) -> bool {
        self.action_kind == ActionKind::FileRead
    }
}

/// Result of an action that has already executed, supplied to post-action
/// observation calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub output: Option<String>,
}

impl ActionOutcome {
    /// A missing exit code counts as success, matching hosts that only
    /// report failures.
    pub fn succeeded(&self) -> bool {
        self.exit_code.unwrap_or(0) == 0
    }
}
