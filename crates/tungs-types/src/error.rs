use thiserror::Error;

/// Errors from the backend-of-record client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transport failure (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// Logical 4xx/5xx from the backend.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The email is already bound to a different external id.
    #[error("email '{email}' is bound to a different identity")]
    IdentityConflict {
        email: String,
        bound_to: Option<String>,
    },
}

impl SyncError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures and 5xx are transient; 4xx and identity conflicts
    /// are not.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::Server { status, .. } => *status >= 500,
            SyncError::IdentityConflict { .. } => false,
        }
    }
}

/// Errors from the local session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cached record could not be decoded. Never fatal.
    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the identity provider adapter.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Failure of an explicit sign-in or sign-out, returned at the engine boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("email '{email}' is already linked to another account")]
    IdentityConflict {
        email: String,
        bound_to: Option<String>,
    },

    #[error("backend rejected the request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl SessionError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::IdentityConflict { .. } => "identity_conflict",
            SessionError::Server { .. } => "server_error",
            SessionError::Identity(_) => "identity_provider",
        }
    }
}

/// Errors from quota operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("no active session")]
    NoSession,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::Network("reset".to_string()).is_transient());
        assert!(
            SyncError::Server {
                status: 503,
                message: "down".to_string()
            }
            .is_transient()
        );
        assert!(
            !SyncError::Server {
                status: 400,
                message: "bad".to_string()
            }
            .is_transient()
        );
        assert!(
            !SyncError::IdentityConflict {
                email: "a@b.c".to_string(),
                bound_to: None
            }
            .is_transient()
        );
    }

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::Server {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "server error 500: boom");
    }

    #[test]
    fn test_session_error_reason() {
        let err = SessionError::IdentityConflict {
            email: "a@b.c".to_string(),
            bound_to: Some("u9".to_string()),
        };
        assert_eq!(err.reason(), "identity_conflict");
        assert!(err.to_string().contains("a@b.c"));

        let err = SessionError::from(IdentityError::Provider("popup closed".to_string()));
        assert_eq!(err.reason(), "identity_provider");
    }
}
