//! `hookgate` – pre/post-action gate for an AI coding agent.
//!
//! The host runs `hookgate pre` before every tool call and `hookgate post`
//! after it, piping the call as JSON on stdin. The reply goes to stdout and
//! the process always exits 0 for those two commands; a gate that cannot
//! judge lets the action through.
//!
//! The remaining subcommands are for operators: inspect state, record a
//! memory sync or a reviewer consultation, and reset records.

mod config;
mod hook;
mod notify;
mod render;
mod usage;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::warn;

use hookgate_kernel::{DecisionEngine, GateConfig, StatusSnapshot, telemetry};
use hookgate_store::{MemoryStore, RecordKey, Records, SqliteStore, StateStore};
use hookgate_types::{HookInput, HookResponse, Notifier, PendingDecisions, PostResponse, Severity};

use crate::notify::FanoutNotifier;
use crate::usage::UsageLog;

#[derive(Debug, Parser)]
#[command(name = "hookgate", version)]
#[command(about = "Policy gate for AI coding agent tool calls")]
struct Cli {
    /// Project root; state and config live in its control directory.
    #[arg(long, global = true, env = "CLAUDE_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Judge a proposed tool call read from stdin.
    Pre,
    /// Record the outcome of a tool call read from stdin.
    Post,
    #[command(flatten)]
    Operator(OperatorCommand),
}

#[derive(Debug, Subcommand)]
enum OperatorCommand {
    /// Show session, test, consultation and context state.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Mark the memory bank as freshly synced.
    Sync,
    /// Record an advisory review by `agent`.
    Consult {
        agent: String,
        #[arg(long, default_value = "")]
        purpose: String,
    },
    /// Record that the host compacted the agent's context.
    Compacted,
    /// Track decisions that still need an ADR.
    Decision {
        #[command(subcommand)]
        command: DecisionCommand,
    },
    /// Delete one record, or `all` of them.
    Reset { target: String },
    /// Send a notification through the configured sinks.
    Notify(NotifyArgs),
    /// Print JSON Schemas for the hook protocol.
    Schema,
}

#[derive(Debug, Subcommand)]
enum DecisionCommand {
    /// Note a decision that needs an ADR.
    Add { text: String },
    /// Mark a decision as documented.
    Done { text: String },
    /// List decisions still waiting for an ADR.
    List,
}

#[derive(Debug, Args)]
struct NotifyArgs {
    /// Read `{title, message, severity}` from stdin when omitted.
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    message: Option<String>,
    #[arg(long, default_value = "info")]
    severity: String,
}

#[derive(Debug, Deserialize)]
struct NotifyPayload {
    title: String,
    message: String,
    #[serde(default)]
    severity: Option<String>,
}

fn main() -> ExitCode {
    let _guard = telemetry::init_tracing("hookgate");
    let cli = Cli::parse();

    let project_root = cli
        .project_dir
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = config::load(&project_root);
    let control_dir = project_root.join(&cfg.control_dir);
    let notifier = FanoutNotifier::from_config(&cfg.notifications, control_dir.clone());
    let engine = DecisionEngine::new(cfg, &project_root);

    match cli.command {
        Command::Pre => {
            let store = open_hook_store(&control_dir, engine.config());
            let reply = hook::run_pre(&engine, store.as_ref(), &notifier, &read_stdin());
            print_reply(&reply, r#"{"decision":"allow"}"#);
            ExitCode::SUCCESS
        }
        Command::Post => {
            let store = open_hook_store(&control_dir, engine.config());
            let usage = UsageLog::from_config(&engine.config().usage_log, &control_dir);
            let reply = hook::run_post(&engine, store.as_ref(), &usage, &read_stdin());
            print_reply(&reply, "{}");
            ExitCode::SUCCESS
        }
        Command::Operator(command) => match operate(command, &engine, &control_dir, &notifier) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {e:#}", "error".red().bold());
                ExitCode::FAILURE
            }
        },
    }
}

fn store_path(control_dir: &Path, cfg: &GateConfig) -> PathBuf {
    control_dir.join(&cfg.store.file_name)
}

/// The configured SQLite store, or a throwaway in-memory one when it cannot
/// be opened so the hooks still answer.
fn open_hook_store(control_dir: &Path, cfg: &GateConfig) -> Box<dyn StateStore> {
    let path = store_path(control_dir, cfg);
    match SqliteStore::open(&path, cfg.busy_timeout()) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state store unavailable; state will not persist");
            Box::new(MemoryStore::new())
        }
    }
}

fn read_stdin() -> String {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        warn!(error = %e, "failed to read stdin");
    }
    raw
}

fn print_reply<T: Serialize>(reply: &T, fallback: &str) {
    match serde_json::to_string(reply) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            warn!(error = %e, "failed to encode reply");
            println!("{fallback}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operator commands
// ─────────────────────────────────────────────────────────────────────────────

impl OperatorCommand {
    fn needs_store(&self) -> bool {
        !matches!(self, OperatorCommand::Notify(_) | OperatorCommand::Schema)
    }
}

/// Run an operator command. Unlike the hooks these never fall back to a
/// throwaway store: reporting success for state that was not saved is worse
/// than failing.
fn operate(
    command: OperatorCommand,
    engine: &DecisionEngine,
    control_dir: &Path,
    notifier: &dyn Notifier,
) -> Result<()> {
    if !command.needs_store() {
        return run_operator(command, engine, &MemoryStore::new(), notifier);
    }
    let path = store_path(control_dir, engine.config());
    let store = SqliteStore::open(&path, engine.config().busy_timeout())
        .with_context(|| format!("opening state store at {}", path.display()))?;
    run_operator(command, engine, &store, notifier)
}

fn run_operator(
    command: OperatorCommand,
    engine: &DecisionEngine,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
) -> Result<()> {
    let now = Utc::now();
    match command {
        OperatorCommand::Status { json } => {
            let snap = StatusSnapshot::collect(store, engine.config(), engine.project_root(), now);
            if json {
                println!("{}", serde_json::to_string_pretty(&snap)?);
            } else {
                print!("{}", render::status_text(&snap));
            }
        }
        OperatorCommand::Sync => {
            engine.record_sync(store, now).context("recording memory sync")?;
            println!("{} memory sync recorded at {}", "✓".green().bold(), now.to_rfc3339());
        }
        OperatorCommand::Consult { agent, purpose } => {
            let agent = agent.trim().to_lowercase();
            if agent.is_empty() {
                bail!("agent name must not be empty");
            }
            if !engine.config().consultation.known_agents.contains(&agent) {
                eprintln!("{} '{}' is not a known reviewer role", "note:".yellow(), agent);
            }
            engine
                .record_consultation(store, &agent, &purpose, now)
                .context("recording consultation")?;
            println!("{} consultation with {} recorded", "✓".green().bold(), agent.bold());
        }
        OperatorCommand::Compacted => {
            let session = engine.record_compaction(store, now).context("recording compaction")?;
            println!(
                "{} compaction #{} recorded; re-read the memory bank before writing code",
                "✓".green().bold(),
                session.compaction_count
            );
        }
        OperatorCommand::Decision { command } => match command {
            DecisionCommand::Add { text } => {
                if text.trim().is_empty() {
                    bail!("decision text must not be empty");
                }
                if engine.record_decision(store, &text, now).context("recording decision")? {
                    println!("{} pending ADR: {}", "✓".green().bold(), text.trim().bold());
                } else {
                    println!("{} already pending: {}", "note:".yellow(), text.trim());
                }
            }
            DecisionCommand::Done { text } => {
                if !engine.resolve_decision(store, &text, now).context("resolving decision")? {
                    bail!("no pending decision matches '{}'", text.trim());
                }
                println!("{} documented: {}", "✓".green().bold(), text.trim().bold());
            }
            DecisionCommand::List => {
                let pending = Records::new(store).read_or_else(PendingDecisions::default);
                if pending.entries.is_empty() {
                    println!("{}", "no pending decisions".dimmed());
                }
                for d in &pending.entries {
                    println!("  • {} {}", d.decision, d.timestamp.to_rfc3339().dimmed());
                }
            }
        },
        OperatorCommand::Reset { target } => {
            let records = Records::new(store);
            if target == "all" {
                records.reset_all().context("resetting all records")?;
            } else {
                let key = RecordKey::from_str(&target).with_context(|| {
                    let known: Vec<&str> = RecordKey::ALL.iter().map(|k| k.as_str()).collect();
                    format!("expected `all` or one of: {}", known.join(", "))
                })?;
                records.reset(key).with_context(|| format!("resetting {key}"))?;
            }
            println!("{} reset {}", "✓".green().bold(), target.bold());
        }
        OperatorCommand::Notify(args) => {
            let payload = match (args.title, args.message) {
                (Some(title), Some(message)) => NotifyPayload {
                    title,
                    message,
                    severity: Some(args.severity),
                },
                (None, None) => serde_json::from_str(&read_stdin()).context("parsing notification from stdin")?,
                _ => bail!("--title and --message must be given together"),
            };
            let severity = match payload.severity.as_deref() {
                Some(s) => Severity::from_str(s)?,
                None => Severity::Info,
            };
            notifier.notify(&payload.title, &payload.message, severity);
        }
        OperatorCommand::Schema => {
            let schemas = serde_json::json!({
                "HookInput": schemars::schema_for!(HookInput),
                "HookResponse": schemars::schema_for!(HookResponse),
                "PostResponse": schemars::schema_for!(PostResponse),
            });
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_operator_commands() {
        let cli = Cli::try_parse_from(["hookgate", "--project-dir", "/tmp/p", "consult", "architect", "--purpose", "review"])
            .expect("parse");
        assert_eq!(cli.project_dir, Some(PathBuf::from("/tmp/p")));
        assert!(matches!(cli.command, Command::Operator(OperatorCommand::Consult { ref agent, ref purpose }) if agent == "architect" && purpose == "review"));

        let cli = Cli::try_parse_from(["hookgate", "status", "--json"]).expect("parse");
        assert!(matches!(cli.command, Command::Operator(OperatorCommand::Status { json: true })));

        let cli = Cli::try_parse_from(["hookgate", "decision", "add", "Use SQLite"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Operator(OperatorCommand::Decision { command: DecisionCommand::Add { ref text } }) if text == "Use SQLite"
        ));
    }

    #[test]
    fn decisions_are_added_and_resolved() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let engine = DecisionEngine::new(GateConfig::default(), dir.path());
        let store = MemoryStore::new();
        let notifier = hookgate_types::NullNotifier;
        let decision = |command| run_operator(OperatorCommand::Decision { command }, &engine, &store, &notifier);

        decision(DecisionCommand::Add { text: "Use SQLite".into() }).expect("add");
        decision(DecisionCommand::Add { text: "Use SQLite".into() }).expect("duplicate add is a no-op");
        decision(DecisionCommand::List).expect("list");
        let pending = Records::new(&store).read::<PendingDecisions>().expect("decisions written");
        assert_eq!(pending.entries.len(), 1);

        assert!(decision(DecisionCommand::Add { text: "  ".into() }).is_err());
        decision(DecisionCommand::Done { text: "Use SQLite".into() }).expect("done");
        let err = decision(DecisionCommand::Done { text: "Use SQLite".into() }).unwrap_err();
        assert!(format!("{err:#}").contains("no pending decision"));
    }

    #[test]
    fn reset_and_consult_go_through_the_store() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let engine = DecisionEngine::new(GateConfig::default(), dir.path());
        let store = MemoryStore::new();
        let notifier = hookgate_types::NullNotifier;

        run_operator(
            OperatorCommand::Consult {
                agent: "QA-Engineer".into(),
                purpose: "pre-commit".into(),
            },
            &engine,
            &store,
            &notifier,
        )
        .expect("consult");
        let log = Records::new(&store).read::<hookgate_types::ConsultationLog>().expect("log written");
        assert_eq!(log.entries[0].agent, "qa-engineer");

        run_operator(OperatorCommand::Reset { target: "consultations".into() }, &engine, &store, &notifier)
            .expect("reset");
        assert!(Records::new(&store).read::<hookgate_types::ConsultationLog>().is_none());

        let err = run_operator(OperatorCommand::Reset { target: "bogus".into() }, &engine, &store, &notifier)
            .unwrap_err();
        assert!(format!("{err:#}").contains("expected `all`"));
    }

    #[test]
    fn hook_store_creates_database_in_control_dir() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let control = dir.path().join(".claude");
        let cfg = GateConfig::default();
        let _store = open_hook_store(&control, &cfg);
        assert!(control.join(&cfg.store.file_name).exists());
    }

    #[test]
    fn operator_commands_fail_when_store_cannot_open() {
        let dir = tempfile::tempdir().expect("tmp dir");
        // A plain file where the control directory should be.
        let control = dir.path().join(".claude");
        std::fs::write(&control, "not a directory").unwrap();
        let engine = DecisionEngine::new(GateConfig::default(), dir.path());
        let notifier = hookgate_types::NullNotifier;

        for command in [
            OperatorCommand::Sync,
            OperatorCommand::Compacted,
            OperatorCommand::Consult {
                agent: "architect".into(),
                purpose: String::new(),
            },
            OperatorCommand::Reset { target: "all".into() },
            OperatorCommand::Decision {
                command: DecisionCommand::Add { text: "Use SQLite".into() },
            },
        ] {
            let err = operate(command, &engine, &control, &notifier).unwrap_err();
            assert!(format!("{err:#}").contains("opening state store"));
        }

        // Hooks still answer, on a store that does not persist.
        let store = open_hook_store(&control, engine.config());
        let reply = hook::run_pre(&engine, store.as_ref(), &notifier, r#"{"tool_name":"Bash","tool_input":{"command":"ls"}}"#);
        assert_eq!(reply, HookResponse::allow());
    }

    #[test]
    fn schema_needs_no_store() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let control = dir.path().join(".claude");
        std::fs::write(&control, "not a directory").unwrap();
        let engine = DecisionEngine::new(GateConfig::default(), dir.path());
        operate(OperatorCommand::Schema, &engine, &control, &hookgate_types::NullNotifier).expect("schema");
    }
}
