//! Event types crossing the engine boundary.
//!
//! `AuthEvent` is what the identity provider emits into the engine;
//! `SessionEvent` is what the engine publishes to the UI layer through the
//! event bus.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::session::Session;

/// Notification from the identity provider.
///
/// Wire shape: `{"event":"authenticated","identity":{...}}` or
/// `{"event":"signedOut"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AuthEvent {
    Authenticated { identity: Identity },
    SignedOut,
}

impl AuthEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::Authenticated { .. } => "authenticated",
            AuthEvent::SignedOut => "signedOut",
        }
    }
}

/// State-transition notification published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A backend-reconciled session is canonical.
    SessionReady { session: Session },
    /// The canonical session was cleared.
    SessionCleared {},
    /// The canonical session is running on local data.
    SessionDegraded { session: Session },
    /// A quota check denied the action.
    QuotaExceeded { session: Session },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SessionReady { .. } => "session-ready",
            SessionEvent::SessionCleared {} => "session-cleared",
            SessionEvent::SessionDegraded { .. } => "session-degraded",
            SessionEvent::QuotaExceeded { .. } => "quota-exceeded",
        }
    }

    /// The session payload, if the event carries one.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionEvent::SessionReady { session }
            | SessionEvent::SessionDegraded { session }
            | SessionEvent::QuotaExceeded { session } => Some(session),
            SessionEvent::SessionCleared {} => None,
        }
    }
}
