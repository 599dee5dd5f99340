//! Quota-checked message sends and explicit reconciliation.

use anyhow::Result;
use console::style;
use serde_json::json;
use tungs_core::session::{Consumption, QuotaDecision};
use tungs_types::error::QuotaError;

use super::output::{print_json, print_session, session_json};
use crate::state::AppState;

/// Consume `count` messages, stopping at the first denial.
///
/// Each message is checked and recorded atomically. Returns an error when
/// the quota runs out before all messages were sent.
pub async fn send(state: &AppState, count: u32, json: bool) -> Result<()> {
    let mut sent = 0u32;
    let mut last_session = None;
    let mut denial = None;

    for _ in 0..count {
        match state.guard.try_consume().await {
            Ok(Consumption::Recorded(session)) => {
                sent += 1;
                last_session = Some(session);
            }
            Ok(Consumption::Denied(decision)) => {
                denial = Some(decision);
                break;
            }
            Err(QuotaError::NoSession) => {
                anyhow::bail!("not signed in; run `tungs login --email <email>` first");
            }
        }
    }

    if json {
        print_json(&json!({
            "requested": count,
            "sent": sent,
            "denied": denial,
            "session": last_session.as_ref().map(session_json),
        }))?;
    } else {
        println!();
        if sent > 0 {
            println!(
                "  {} Sent {} message(s)",
                style("✓").green().bold(),
                style(sent).bold()
            );
        }
        if let Some(QuotaDecision::Exceeded { used, limit }) = denial {
            println!(
                "  {} Message limit reached ({used}/{limit}). Upgrade your plan to keep going.",
                style("✗").red().bold()
            );
        }
        if let Some(session) = &last_session {
            println!();
            print_session(session);
        }
        println!();
    }

    match denial {
        Some(_) => anyhow::bail!("message quota exceeded after {sent} of {count} message(s)"),
        None => Ok(()),
    }
}

/// Flush queued usage and refresh the profile from the backend.
pub async fn sync(state: &AppState, json: bool) -> Result<()> {
    let result = state.engine.reconcile_pending().await;

    if json {
        let value = match &result {
            Ok(Some(session)) => json!({ "synced": true, "session": session_json(session) }),
            Ok(None) => json!({ "synced": false, "session": null }),
            Err(e) => json!({
                "synced": false,
                "error": e.to_string(),
                "session": state.engine.current_session().await.as_ref().map(session_json),
            }),
        };
        print_json(&value)?;
        return result.map(|_| ()).map_err(Into::into);
    }

    println!();
    match result {
        Ok(Some(session)) => {
            println!("  {} In sync with the backend", style("✓").green().bold());
            println!();
            print_session(&session);
            println!();
            Ok(())
        }
        Ok(None) => {
            println!("  Not signed in; nothing to sync.");
            println!();
            Ok(())
        }
        Err(e) => {
            let pending = state
                .engine
                .current_session()
                .await
                .map(|s| s.pending_delta)
                .unwrap_or_default();
            println!(
                "  {} Backend still unreachable; {} message(s) remain queued",
                style("!").yellow().bold(),
                style(pending).yellow()
            );
            println!();
            Err(e.into())
        }
    }
}
