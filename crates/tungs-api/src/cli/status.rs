//! Session status command.

use anyhow::Result;
use console::style;
use serde_json::json;

use super::output::{phase_label, print_json, print_session, session_json};
use crate::state::AppState;

/// Display the current session, its quota, and sync state.
///
/// Reads the local view only; `tungs sync` talks to the backend.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let phase = state.engine.phase().await;
    let session = state.engine.current_session().await;

    if json {
        let status = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "backend": state.config.backend.base_url,
            "phase": phase,
            "session": session.as_ref().map(session_json),
        });
        return print_json(&status);
    }

    println!();
    println!("  {} Tungs v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Session ──").dim());
    println!("  State:     {}", phase_label(phase));
    match &session {
        Some(session) => print_session(session),
        None => println!(
            "  {}",
            style("Run `tungs login --email <email>` to sign in.").dim()
        ),
    }
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir:  {}", style(state.data_dir.display()).cyan());
    println!("  Backend:   {}", style(&state.config.backend.base_url).cyan());
    println!();

    Ok(())
}
