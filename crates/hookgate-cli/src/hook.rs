//! The `pre` and `post` hook entry points.
//!
//! Both turn raw stdin into a reply and never fail: anything the gate cannot
//! understand is allowed through untouched.

use chrono::Utc;
use tracing::{debug, warn};

use hookgate_kernel::DecisionEngine;
use hookgate_store::StateStore;
use hookgate_types::{ActionOutcome, ActionRequest, HookInput, HookResponse, Notifier, PostResponse};

use crate::usage::{UsageEntry, UsageLog};

struct Parsed {
    tool: String,
    request: ActionRequest,
    outcome: ActionOutcome,
}

fn parse(raw: &str) -> Option<Parsed> {
    if raw.trim().is_empty() {
        debug!("empty hook input");
        return None;
    }
    let parsed = HookInput::from_json(raw).and_then(|input| {
        let tool = input.tool_name().to_string();
        Ok(input
            .into_request()?
            .map(|(request, outcome)| Parsed { tool, request, outcome }))
    });
    match parsed {
        Ok(Some(parsed)) => Some(parsed),
        Ok(None) => {
            debug!("tool not gated");
            None
        }
        Err(e) => {
            warn!(error = %e, "unparseable hook input; allowing");
            None
        }
    }
}

/// Judge a proposed action.
pub fn run_pre(
    engine: &DecisionEngine,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
    raw: &str,
) -> HookResponse {
    match parse(raw) {
        Some(p) => HookResponse::from(&engine.evaluate(&p.request, store, notifier)),
        None => HookResponse::allow(),
    }
}

/// Record the result of an action that already ran.
pub fn run_post(engine: &DecisionEngine, store: &dyn StateStore, usage: &UsageLog, raw: &str) -> PostResponse {
    let Some(p) = parse(raw) else {
        return PostResponse::default();
    };
    usage.record(&UsageEntry::new(&p.tool, &p.request, &p.outcome, Utc::now()));
    engine.observe_outcome(&p.request, &p.outcome, store)
}
