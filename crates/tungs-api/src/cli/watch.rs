//! Drive the engine from identity provider notifications on stdin.
//!
//! Each stdin line is one JSON notification, for example
//! `{"event":"authenticated","identity":{"id":"u1","email":"ada@example.com"}}`
//! or `{"event":"signedOut"}`. Session events are printed as they happen.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tungs_core::session::run_auth_events;
use tungs_infra::identity::ChannelIdentityProvider;

use super::output::event_line;
use crate::state::AppState;

const QUEUE_CAPACITY: usize = 32;

pub async fn watch(state: &AppState, json: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let cancel = CancellationToken::new();

    let (subscription, mut events) = state.engine.bus().subscribe_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "failed to encode session event"),
                }
            } else {
                println!("  {}", event_line(&event));
            }
        }
    });

    let pump = tokio::spawn(run_auth_events(
        Arc::clone(&state.engine),
        rx,
        cancel.clone(),
    ));

    if !json {
        eprintln!(
            "  {}",
            style("Reading identity provider notifications from stdin (Ctrl+C to stop)").dim()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match ChannelIdentityProvider::parse_notification(&line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping notification"),
                }
            }
        }
    }

    // Closing the queue lets the pump drain what was already sent.
    drop(tx);
    let handled = pump.await?;
    state.engine.bus().unsubscribe(subscription);
    printer.await?;

    tracing::info!(handled, "auth event pump stopped");
    Ok(())
}
