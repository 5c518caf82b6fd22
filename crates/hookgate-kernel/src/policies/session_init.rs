//! No real work until the memory bank has been read.
//!
//! Reading `projectbrief.md`, `systemPatterns.md`, and `activeContext.md`
//! initializes the session. Until then, writes outside the control
//! directory (other than tests) and commits are refused.

use hookgate_store::StoreError;
use hookgate_types::{ActionKind, ActionRequest};
use tracing::debug;

use crate::classify;
use crate::policy::{GateContext, Policy, PolicyVerdict};

#[derive(Default)]
pub struct SessionInitialization;

impl SessionInitialization {
    pub fn new() -> Self {
        Self
    }
}

fn is_exempt_write(path: &str, control_dir: &str) -> bool {
    classify::is_under_control_dir(path, control_dir) || classify::is_test_file(path)
}

impl Policy for SessionInitialization {
    fn name(&self) -> &'static str {
        "session_initialization"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        match request.action_kind {
            ActionKind::FileWrite | ActionKind::FileRead => request.path().is_some(),
            ActionKind::ShellCommand => request.shell_command().is_some_and(classify::is_commit),
            ActionKind::AgentInvocation => false,
        }
    }

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        let gated = match request.action_kind {
            ActionKind::FileWrite => request
                .path()
                .is_some_and(|p| !is_exempt_write(p, &ctx.config.control_dir)),
            ActionKind::ShellCommand => true,
            _ => false,
        };
        if !gated {
            return PolicyVerdict::Pass;
        }
        let session = ctx.session();
        if session.initialized {
            return PolicyVerdict::Pass;
        }
        let missing: Vec<String> = session
            .missing_required_docs()
            .iter()
            .map(ToString::to_string)
            .collect();
        PolicyVerdict::block(
            format!(
                "Session not initialized. Read the memory bank before making changes; missing: {}",
                missing.join(", ")
            ),
            format!(
                "Read {} from the memory bank first.",
                missing.join(", ")
            ),
        )
    }

    fn observe(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> Result<(), StoreError> {
        if !request.is_read() {
            return Ok(());
        }
        let Some(doc) = request.path().and_then(classify::doc_for_path) else {
            return Ok(());
        };
        if ctx.session().required_docs_read.contains(&doc) {
            return Ok(());
        }
        let session = ctx.update_session(|s| {
            s.mark_doc_read(doc);
        })?;
        debug!(%doc, initialized = session.initialized, "memory document read");
        Ok(())
    }
}
