//! Shared rendering for command output.

use console::style;
use serde::Serialize;
use serde_json::{Value, json};
use tungs_core::session::AuthOutcome;
use tungs_types::event::SessionEvent;
use tungs_types::session::{Session, SessionPhase};

/// Pretty-print any serializable value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Flattened JSON view of a session for `--json` output.
pub fn session_json(session: &Session) -> Value {
    json!({
        "session_id": session.session_id,
        "identity_id": session.identity.id,
        "email": session.identity.email,
        "display_name": session.identity.display_name,
        "plan": session.profile.plan,
        "messages_used": session.profile.messages_used,
        "messages_limit": session.profile.messages_limit,
        "remaining": session.profile.remaining(),
        "degraded": session.degraded,
        "pending_delta": session.pending_delta,
        "last_login": session.profile.last_login,
    })
}

/// Machine-readable name of an auth outcome.
pub fn outcome_name(outcome: &AuthOutcome) -> &'static str {
    match outcome {
        AuthOutcome::Ready(_) => "ready",
        AuthOutcome::Degraded(_) => "degraded",
        AuthOutcome::Cleared => "cleared",
        AuthOutcome::AlreadySignedOut => "already_signed_out",
        AuthOutcome::Superseded => "superseded",
    }
}

/// Colored phase label.
pub fn phase_label(phase: SessionPhase) -> String {
    match phase {
        SessionPhase::Reconciled => style("reconciled").green().to_string(),
        SessionPhase::Degraded => style("degraded (offline)").yellow().to_string(),
        SessionPhase::Authenticating => style("authenticating").cyan().to_string(),
        SessionPhase::SignedOut => style("signed out").dim().to_string(),
    }
}

/// Print the session block shared by `login`, `status`, and `sync`.
pub fn print_session(session: &Session) {
    let profile = &session.profile;
    println!(
        "  {} {}",
        style(&session.identity.display_name).cyan().bold(),
        style(format!("<{}>", session.identity.email)).dim()
    );
    println!("  Plan:      {}", style(profile.plan).bold());
    println!(
        "  Messages:  {} / {} ({} left)",
        style(profile.messages_used).bold(),
        profile.messages_limit,
        usage_style(profile.remaining(), profile.messages_limit)
    );
    if session.degraded {
        println!(
            "  {} Offline: backend unreachable, using local data",
            style("!").yellow().bold()
        );
    }
    if session.pending_delta > 0 {
        println!(
            "  Pending:   {} message(s) waiting to sync",
            style(session.pending_delta).yellow()
        );
    }
}

fn usage_style(remaining: u64, limit: u64) -> String {
    if remaining == 0 {
        style(remaining).red().bold().to_string()
    } else if remaining * 10 <= limit {
        style(remaining).yellow().to_string()
    } else {
        style(remaining).green().to_string()
    }
}

/// One line describing a session event, for `watch`.
pub fn event_line(event: &SessionEvent) -> String {
    match event.session() {
        Some(session) => format!(
            "{} {} {}/{}{}",
            style(event.kind()).bold(),
            session.identity.id,
            session.profile.messages_used,
            session.profile.messages_limit,
            if session.pending_delta > 0 {
                format!(" (+{} pending)", session.pending_delta)
            } else {
                String::new()
            }
        ),
        None => style(event.kind()).bold().to_string(),
    }
}
