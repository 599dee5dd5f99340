use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::identity::{Identity, IdentityId};
use crate::profile::UserProfile;

/// Current version of the persisted session record.
pub const SCHEMA_VERSION: u32 = 1;

/// The canonical representation of the currently authenticated user.
///
/// Serialized as the persisted cache record, so field names follow the
/// camelCase wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable for the lifetime of one sign-in; a new sign-in mints a new id.
    pub session_id: Uuid,
    pub identity: Identity,
    pub profile: UserProfile,
    /// True while the backend-of-record is unreachable and the local view
    /// is authoritative.
    pub degraded: bool,
    /// Usage recorded locally but not yet confirmed by the backend.
    pub pending_delta: u64,
    pub schema_version: u32,
}

impl Session {
    pub fn new(identity: Identity, profile: UserProfile, degraded: bool) -> Self {
        Self {
            session_id: Uuid::now_v7(),
            identity,
            profile,
            degraded,
            pending_delta: 0,
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn identity_id(&self) -> &IdentityId {
        &self.identity.id
    }

    /// Whether this session belongs to the given identity.
    pub fn belongs_to(&self, id: &IdentityId) -> bool {
        &self.identity.id == id
    }
}

/// Engine state machine phase.
///
/// `SignedOut -> Authenticating -> {Reconciled, Degraded} -> SignedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    SignedOut,
    Authenticating,
    Reconciled,
    Degraded,
}

impl SessionPhase {
    /// Phase a session settles in after a transition.
    pub fn settled(session: &Session) -> Self {
        if session.degraded {
            SessionPhase::Degraded
        } else {
            SessionPhase::Reconciled
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::SignedOut => write!(f, "signed_out"),
            SessionPhase::Authenticating => write!(f, "authenticating"),
            SessionPhase::Reconciled => write!(f, "reconciled"),
            SessionPhase::Degraded => write!(f, "degraded"),
        }
    }
}
