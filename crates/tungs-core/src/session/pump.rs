//! Drives the engine from a stream of identity provider events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tungs_types::event::AuthEvent;

use super::engine::ReconciliationEngine;
use crate::repository::{BackendSync, IdentityProvider, SessionStore};

/// Feed auth events into the engine one at a time, in arrival order.
///
/// Runs until the channel closes or `cancel` fires. Failed sign-ins are
/// logged and do not stop the pump. Returns the number of events handled.
pub async fn run_auth_events<I, B, S>(
    engine: Arc<ReconciliationEngine<I, B, S>>,
    mut events: mpsc::Receiver<AuthEvent>,
    cancel: CancellationToken,
) -> usize
where
    I: IdentityProvider,
    B: BackendSync,
    S: SessionStore,
{
    let mut handled = 0;
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(handled, "auth event pump cancelled");
                break;
            }
            next = events.recv() => match next {
                Some(event) => event,
                None => {
                    debug!(handled, "auth event channel closed");
                    break;
                }
            },
        };

        let kind = event.kind();
        match engine.on_auth_event(event).await {
            Ok(outcome) => info!(event = kind, ?outcome, "auth event handled"),
            Err(e) => warn!(event = kind, reason = e.reason(), error = %e, "auth event failed"),
        }
        handled += 1;
    }
    handled
}
