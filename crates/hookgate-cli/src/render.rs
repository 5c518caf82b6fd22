//! Coloured text rendering of a [`StatusSnapshot`].

use std::fmt::Write;

use colored::{ColoredString, Colorize};

use hookgate_kernel::StatusSnapshot;

fn yes_no(ok: bool) -> ColoredString {
    if ok { "yes".green() } else { "no".red() }
}

fn level(label: &str) -> ColoredString {
    match label {
        "ok" | "normal" => label.green(),
        "warn" | "warning" => label.yellow(),
        _ => label.red().bold(),
    }
}

/// Render `snap` for a terminal.
pub fn status_text(snap: &StatusSnapshot) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_status(&mut out, snap);
    out
}

fn write_status(out: &mut String, snap: &StatusSnapshot) -> std::fmt::Result {
    let s = &snap.session;
    writeln!(out, "{}", "Session".bold().underline())?;
    writeln!(out, "  id          : {}", s.session_id.dimmed())?;
    writeln!(out, "  started     : {}", s.session_start.to_rfc3339())?;
    writeln!(out, "  initialized : {}", yes_no(s.initialized))?;
    if !s.missing_docs.is_empty() {
        let missing: Vec<String> = s.missing_docs.iter().map(ToString::to_string).collect();
        writeln!(out, "  missing     : {}", missing.join(", ").yellow())?;
    }
    writeln!(out, "  actions     : {}", s.significant_actions)?;
    writeln!(out, "  compactions : {}", s.compaction_count)?;
    writeln!(out)?;

    let r = &snap.recitation;
    writeln!(out, "{}", "Recitation".bold().underline())?;
    writeln!(
        out,
        "  {} actions since last recitation ({})",
        r.actions_since_recitation,
        level(r.level)
    )?;
    if let Some(t) = r.last_recitation {
        writeln!(out, "  last        : {}", t.to_rfc3339())?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "Tests".bold().underline())?;
    match (snap.tdd.last_run, snap.tdd.tests_passed) {
        (Some(t), Some(passed)) => {
            let result = if passed { "passed".green() } else { "failed".red() };
            let freshness = if snap.tdd.valid { "fresh".green() } else { "expired".yellow() };
            writeln!(out, "  last run {result} at {} ({freshness})", t.to_rfc3339())?;
        }
        _ => writeln!(out, "  {}", "no test run recorded".yellow())?,
    }
    writeln!(out)?;

    writeln!(out, "{}", "Consultations".bold().underline())?;
    if snap.recent_consultations.is_empty() {
        writeln!(out, "  {}", "none".dimmed())?;
    }
    for c in &snap.recent_consultations {
        writeln!(out, "  • {} {} {}", c.agent.bold(), c.timestamp.to_rfc3339().dimmed(), c.purpose)?;
    }
    writeln!(out)?;

    if !snap.features.is_empty() {
        writeln!(out, "{}", "Features".bold().underline())?;
        for f in &snap.features {
            let marker = if f.current { "▶" } else { " " };
            writeln!(
                out,
                "  {} {} [{}] prd: {} epic: {}",
                marker.green(),
                f.name.bold(),
                f.record.phase.to_string().cyan(),
                yes_no(f.record.prd_exists),
                yes_no(f.record.epic_exists)
            )?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", "Memory sync".bold().underline())?;
    match snap.minutes_since_sync {
        Some(m) => writeln!(out, "  {m} minute(s) ago")?,
        None => writeln!(out, "  {}", "never".yellow())?,
    }
    writeln!(out)?;

    let c = &snap.context;
    writeln!(out, "{}", "Context".bold().underline())?;
    writeln!(
        out,
        "  ~{} tokens over {} tool calls ({})",
        c.estimated_tokens,
        c.tool_calls,
        level(c.level)
    )?;

    if !snap.pending_decisions.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Pending ADRs".bold().underline())?;
        for d in &snap.pending_decisions {
            writeln!(out, "  • {} {}", d.decision, d.timestamp.to_rfc3339().dimmed())?;
        }
    }

    if !snap.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Recommendations".bold().underline())?;
        for r in &snap.recommendations {
            writeln!(out, "  → {r}")?;
        }
    }
    Ok(())
}
