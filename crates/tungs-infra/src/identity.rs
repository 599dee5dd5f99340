//! Channel-backed identity provider adapter.
//!
//! External identity providers deliver JSON notifications of the form
//! `{"event":"authenticated","identity":{...}}` or `{"event":"signedOut"}`.
//! This adapter parses them into [`AuthEvent`]s and forwards them over a
//! bounded channel that `tungs_core::session::run_auth_events` consumes.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use tungs_core::repository::IdentityProvider;
use tungs_types::error::IdentityError;
use tungs_types::event::AuthEvent;

pub struct ChannelIdentityProvider {
    tx: mpsc::Sender<AuthEvent>,
}

impl ChannelIdentityProvider {
    /// Create the adapter and the receiving end for the event pump.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuthEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Parse one provider notification. Identity fields are normalized.
    pub fn parse_notification(raw: &str) -> Result<AuthEvent, IdentityError> {
        let event: AuthEvent = serde_json::from_str(raw.trim())
            .map_err(|e| IdentityError::Provider(format!("invalid notification: {e}")))?;

        Ok(match event {
            AuthEvent::Authenticated { identity } => {
                if identity.id.as_str().trim().is_empty() {
                    return Err(IdentityError::Provider(
                        "notification has an empty identity id".to_string(),
                    ));
                }
                AuthEvent::Authenticated {
                    identity: identity.normalized(),
                }
            }
            AuthEvent::SignedOut => AuthEvent::SignedOut,
        })
    }

    /// Forward an event to the pump, waiting for channel capacity.
    pub async fn notify(&self, event: AuthEvent) -> Result<(), IdentityError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| IdentityError::Provider("auth event receiver closed".to_string()))
    }

    /// Parse and forward a raw notification.
    pub async fn notify_raw(&self, raw: &str) -> Result<(), IdentityError> {
        self.notify(Self::parse_notification(raw)?).await
    }
}

impl IdentityProvider for ChannelIdentityProvider {
    /// Ends the provider session by announcing `signedOut` to any listener.
    ///
    /// With no listener attached there is no provider session to end, so a
    /// closed channel is not an error.
    async fn sign_out(&self) -> Result<(), IdentityError> {
        match self.tx.try_send(AuthEvent::SignedOut) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => {
                debug!("no auth event listener attached, nothing to sign out");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(IdentityError::Provider(
                "auth event queue is full".to_string(),
            )),
        }
    }
}
