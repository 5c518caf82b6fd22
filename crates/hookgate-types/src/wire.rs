//! JSON protocol spoken with the host on stdin/stdout.
//!
//! Two input shapes are accepted:
//!
//! - the host's tool-call envelope, `{ "tool_name": "Bash", "tool_input": { … } }`;
//! - a direct request, `{ "actionKind": "ShellCommand", "command": "…" }`.
//!
//! The gate replies with a [`HookResponse`] before the action runs and a
//! [`PostResponse`] after it ran.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decision::{Decision, Verdict};
use crate::request::{ActionKind, ActionOutcome, ActionRequest};
use crate::GateError;

/// Anything the host may send to the gate.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum HookInput {
    Tool(ToolCall),
    Direct(DirectRequest),
}

/// Host envelope describing a tool call.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: ToolInput,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub tool_output: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub notebook_path: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub subagent_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request expressed directly in the gate's own vocabulary.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectRequest {
    pub action_kind: ActionKind,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub agent_prompt: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub output: Option<String>,
}

impl HookInput {
    pub fn from_json(raw: &str) -> Result<Self, GateError> {
        serde_json::from_str(raw).map_err(|e| GateError::MalformedInput(e.to_string()))
    }

    /// Host tool name, or the action kind for direct requests.
    pub fn tool_name(&self) -> &str {
        match self {
            HookInput::Tool(call) => &call.tool_name,
            HookInput::Direct(direct) => direct.action_kind.as_str(),
        }
    }

    /// Normalize into a request plus whatever outcome data came with it.
    ///
    /// `Ok(None)` means the tool is not one the gate has an opinion about.
    pub fn into_request(self) -> Result<Option<(ActionRequest, ActionOutcome)>, GateError> {
        match self {
            HookInput::Tool(call) => call.into_request(),
            HookInput::Direct(direct) => direct.into_request().map(Some),
        }
    }
}

impl ToolCall {
    fn into_request(self) -> Result<Option<(ActionRequest, ActionOutcome)>, GateError> {
        let ToolCall {
            tool_name,
            tool_input,
            exit_code,
            tool_output,
        } = self;
        let request = match tool_name.as_str() {
            "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => {
                let path = tool_input
                    .file_path
                    .or(tool_input.notebook_path)
                    .filter(|p| !p.is_empty())
                    .ok_or(GateError::MissingField {
                        kind: ActionKind::FileWrite,
                        field: "file_path",
                    })?;
                ActionRequest::file_write(path)
            }
            "Read" => {
                let path = tool_input.file_path.filter(|p| !p.is_empty()).ok_or(
                    GateError::MissingField {
                        kind: ActionKind::FileRead,
                        field: "file_path",
                    },
                )?;
                ActionRequest::file_read(path)
            }
            "Bash" => {
                let command = tool_input.command.filter(|c| !c.trim().is_empty()).ok_or(
                    GateError::MissingField {
                        kind: ActionKind::ShellCommand,
                        field: "command",
                    },
                )?;
                ActionRequest::shell(command)
            }
            "Task" => {
                let prompt = match (tool_input.description, tool_input.prompt) {
                    (Some(d), Some(p)) => format!("{d}\n{p}"),
                    (Some(d), None) => d,
                    (None, Some(p)) => p,
                    (None, None) => String::new(),
                };
                ActionRequest::agent_invocation(tool_input.subagent_type, prompt)
            }
            _ => return Ok(None),
        };
        let output = tool_output.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        Ok(Some((request, ActionOutcome { exit_code, output })))
    }
}

impl DirectRequest {
    fn into_request(self) -> Result<(ActionRequest, ActionOutcome), GateError> {
        let missing = |field| GateError::MissingField {
            kind: self.action_kind,
            field,
        };
        match self.action_kind {
            ActionKind::FileWrite | ActionKind::FileRead if self.file_path.is_none() => {
                return Err(missing("filePath"));
            }
            ActionKind::ShellCommand if self.command.is_none() => return Err(missing("command")),
            _ => {}
        }
        let request = ActionRequest {
            action_kind: self.action_kind,
            file_path: self.file_path,
            command: self.command,
            agent_prompt: self.agent_prompt,
            agent: self.agent,
        };
        let outcome = ActionOutcome {
            exit_code: self.exit_code,
            output: self.output,
        };
        Ok((request, outcome))
    }
}

/// Pre-action reply. Success is signalled through this payload, never
/// through the process exit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct HookResponse {
    pub decision: WireVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// All warnings, newline separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WireVerdict {
    Allow,
    Block,
}

impl HookResponse {
    /// The fail-open reply used whenever the gate cannot evaluate.
    pub fn allow() -> Self {
        Self {
            decision: WireVerdict::Allow,
            reason: None,
            suggestion: None,
            warning: None,
        }
    }
}

impl From<&Decision> for HookResponse {
    fn from(d: &Decision) -> Self {
        let decision = match d.verdict {
            Verdict::Allow => WireVerdict::Allow,
            Verdict::Block => WireVerdict::Block,
        };
        Self {
            decision,
            reason: d.reason.clone(),
            suggestion: d.suggestion.clone(),
            warning: (!d.warnings.is_empty()).then(|| d.warnings.join("\n")),
        }
    }
}

/// Post-action reply. Empty object when there is nothing to say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PostResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_directive: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<(ActionRequest, ActionOutcome)> {
        HookInput::from_json(raw).unwrap().into_request().unwrap()
    }

    #[test]
    fn tool_name_covers_both_forms() {
        let tool = HookInput::from_json(r#"{"tool_name":"MultiEdit","tool_input":{}}"#).unwrap();
        assert_eq!(tool.tool_name(), "MultiEdit");
        let direct = HookInput::from_json(r#"{"actionKind":"ShellCommand","command":"ls"}"#).unwrap();
        assert_eq!(direct.tool_name(), "ShellCommand");
    }

    #[test]
    fn bash_envelope_becomes_shell_command() {
        let (req, outcome) =
            parse(r#"{"tool_name":"Bash","tool_input":{"command":"cargo test"},"exit_code":1}"#).unwrap();
        assert_eq!(req.shell_command(), Some("cargo test"));
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[test]
    fn edit_tools_become_file_writes() {
        for tool in ["Write", "Edit", "MultiEdit"] {
            let raw = format!(r#"{{"tool_name":"{tool}","tool_input":{{"file_path":"src/lib.rs"}}}}"#);
            let (req, _) = parse(&raw).unwrap();
            assert!(req.is_write(), "{tool} should map to FileWrite");
        }
        let (req, _) =
            parse(r#"{"tool_name":"NotebookEdit","tool_input":{"notebook_path":"nb.ipynb"}}"#).unwrap();
        assert_eq!(req.path(), Some("nb.ipynb"));
    }

    #[test]
    fn task_envelope_carries_subagent_type() {
        let (req, _) = parse(
            r#"{"tool_name":"Task","tool_input":{"subagent_type":"qa-engineer","description":"review","prompt":"check tests"}}"#,
        )
        .unwrap();
        assert_eq!(req.action_kind, ActionKind::AgentInvocation);
        assert_eq!(req.agent.as_deref(), Some("qa-engineer"));
        assert_eq!(req.agent_prompt.as_deref(), Some("review\ncheck tests"));
    }

    #[test]
    fn unknown_tool_is_ignored() {
        assert!(parse(r#"{"tool_name":"WebFetch","tool_input":{}}"#).is_none());
    }

    #[test]
    fn structured_tool_output_is_stringified() {
        let (_, outcome) = parse(
            r#"{"tool_name":"Bash","tool_input":{"command":"ls"},"tool_output":{"stdout":"a"}}"#,
        )
        .unwrap();
        assert_eq!(outcome.output.as_deref(), Some(r#"{"stdout":"a"}"#));
    }

    #[test]
    fn direct_form_is_accepted() {
        let (req, _) = parse(r#"{"actionKind":"FileWrite","filePath":".env"}"#).unwrap();
        assert_eq!(req.path(), Some(".env"));
    }

    #[test]
    fn missing_payload_is_an_error() {
        let err = HookInput::from_json(r#"{"tool_name":"Bash","tool_input":{}}"#)
            .unwrap()
            .into_request()
            .unwrap_err();
        assert!(matches!(err, GateError::MissingField { field: "command", .. }));

        let err = HookInput::from_json(r#"{"actionKind":"FileWrite"}"#)
            .unwrap()
            .into_request()
            .unwrap_err();
        assert!(matches!(err, GateError::MissingField { field: "filePath", .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            HookInput::from_json("not json"),
            Err(GateError::MalformedInput(_))
        ));
        assert!(HookInput::from_json(r#"{"hello":"world"}"#).is_err());
    }

    #[test]
    fn response_joins_warnings_and_omits_empty_fields() {
        let allow = serde_json::to_string(&HookResponse::allow()).unwrap();
        assert_eq!(allow, r#"{"decision":"allow"}"#);

        let d = Decision::allow().with_warnings(vec!["a".into(), "b".into()]);
        let resp = HookResponse::from(&d);
        assert_eq!(resp.warning.as_deref(), Some("a\nb"));

        let blocked = HookResponse::from(&Decision::block("no", None));
        let json = serde_json::to_string(&blocked).unwrap();
        assert_eq!(json, r#"{"decision":"block","reason":"no"}"#);
    }
}
