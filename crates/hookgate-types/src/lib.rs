//! `hookgate-types` – shared vocabulary of the HookGate workspace.
//!
//! Every other crate speaks in these types: the [`ActionRequest`] an agent
//! proposes, the [`Decision`] the engine returns, the persisted state
//! records each policy owns, and the JSON wire protocol spoken with the host
//! on stdin/stdout.
//!
//! # Modules
//!
//! - [`request`] – [`ActionRequest`], [`ActionKind`], [`ActionOutcome`].
//! - [`decision`] – [`Decision`] and its terminal [`Verdict`].
//! - [`records`] – state records persisted between gate invocations.
//! - [`wire`] – hook input envelopes and response payloads.
//! - [`notify`] – the [`Notifier`] side channel and [`Severity`] levels.

use thiserror::Error;

pub mod decision;
pub mod notify;
pub mod records;
pub mod request;
pub mod wire;

pub use decision::{Decision, Verdict};
pub use notify::{Notifier, NullNotifier, Severity};
pub use records::{
    Consultation, ConsultationLog, ConsultedAgent, ContextUsage, DocId, FeatureGovernanceState,
    FeatureRecord, LastSyncMarker, PendingDecision, PendingDecisions, Phase, RecitationEntry,
    RecitationLog, SessionState, TestRunState,
};
pub use request::{ActionKind, ActionOutcome, ActionRequest};
pub use wire::{HookInput, HookResponse, PostResponse};

/// Errors raised while turning host input into an [`ActionRequest`].
///
/// None of these ever reach the host as a failure: the gate answers `allow`
/// whenever it cannot understand what it was asked.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("malformed hook input: {0}")]
    MalformedInput(String),

    #[error("{kind:?} request is missing `{field}`")]
    MissingField { kind: ActionKind, field: &'static str },

    #[error("unknown severity `{0}`")]
    UnknownSeverity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_error_display() {
        let err = GateError::MissingField {
            kind: ActionKind::FileWrite,
            field: "filePath",
        };
        assert!(err.to_string().contains("filePath"));
        assert!(err.to_string().contains("FileWrite"));

        let err = GateError::MalformedInput("expected value".into());
        assert!(err.to_string().starts_with("malformed hook input"));
    }
}
