//! `hookgate-kernel` – policies and the decision engine.
//!
//! The kernel does not execute anything. It judges a proposed action against
//! a fixed set of policies and records what it saw so the next, independent
//! invocation can judge in context.
//!
//! # Modules
//!
//! - [`engine`] – [`DecisionEngine`][engine::DecisionEngine]: runs the
//!   policies in priority order, resolves one [`Decision`][hookgate_types::Decision],
//!   and drives the observation steps that update state.
//! - [`policy`] – the [`Policy`][policy::Policy] trait and the per-invocation
//!   [`GateContext`][policy::GateContext].
//! - [`policies`] – the eight built-in policies.
//! - [`config`] – [`GateConfig`][config::GateConfig]: thresholds, windows,
//!   required reviewers, and the operator-tunable pattern tables.
//! - [`patterns`] – [`PatternTable`][patterns::PatternTable]: ordered regex
//!   rules compiled from the config.
//! - [`classify`] – path and command classification helpers.
//! - [`context_usage`] – [`ContextTracker`][context_usage::ContextTracker]:
//!   token estimates and compaction reminders.
//! - [`status`] – [`StatusSnapshot`][status::StatusSnapshot]: read-only view
//!   for operators.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod classify;
pub mod config;
pub mod context_usage;
pub mod engine;
pub mod patterns;
pub mod policies;
pub mod policy;
pub mod status;
pub mod telemetry;

pub use config::{ConfigError, GateConfig, PatternRule, RuleAction};
pub use context_usage::{ContextLevel, ContextTracker};
pub use engine::DecisionEngine;
pub use patterns::PatternTable;
pub use policy::{GateContext, Policy, PolicyVerdict};
pub use status::StatusSnapshot;
