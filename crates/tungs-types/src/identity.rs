use serde::{Deserialize, Serialize};

use std::fmt;

/// Prefix for identities created by the email-only local login.
pub const LOCAL_ID_PREFIX: &str = "local:";

/// External identity id asserted by the identity provider (an IdP-issued uid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id was minted by the email-only local login.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity claim carried by an `authenticated` notification.
///
/// Immutable once established for a sign-in. Construct through
/// [`Identity::new`] so the display-name default is applied exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

impl Identity {
    /// Build an identity, defaulting an empty display name to the local part
    /// of the email ("ada@example.com" -> "ada").
    pub fn new(id: IdentityId, email: impl Into<String>, display_name: impl Into<String>) -> Self {
        let email = email.into().trim().to_string();
        let display_name = display_name.into().trim().to_string();
        let display_name = if display_name.is_empty() {
            default_display_name(&email)
        } else {
            display_name
        };
        Self {
            id,
            email,
            display_name,
        }
    }

    /// Identity for the email-only local login.
    ///
    /// The id is `local:<email>` so it can never collide with an IdP-issued id.
    pub fn local(email: impl Into<String>) -> Self {
        let email = email.into().trim().to_lowercase();
        let id = IdentityId(format!("{LOCAL_ID_PREFIX}{email}"));
        Self::new(id, email, "")
    }

    /// Re-apply construction defaults after deserializing an untrusted payload.
    pub fn normalized(self) -> Self {
        Self::new(self.id, self.email, self.display_name)
    }
}

fn default_display_name(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "User".to_string(),
    }
}
