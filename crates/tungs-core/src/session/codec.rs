//! Encoding of the persisted session record.
//!
//! The record is a single JSON document stored under one well-known key.
//! Anything that fails to decode, or carries a schema version this build does
//! not understand, is reported as [`StoreError::CacheCorruption`].

use tungs_types::error::StoreError;
use tungs_types::session::{SCHEMA_VERSION, Session};

pub fn encode(session: &Session) -> Result<String, StoreError> {
    serde_json::to_string(session).map_err(|e| StoreError::Storage(e.to_string()))
}

pub fn decode(raw: &str) -> Result<Session, StoreError> {
    let session: Session =
        serde_json::from_str(raw).map_err(|e| StoreError::CacheCorruption(e.to_string()))?;

    if session.schema_version == 0 || session.schema_version > SCHEMA_VERSION {
        return Err(StoreError::CacheCorruption(format!(
            "unsupported schema version {}",
            session.schema_version
        )));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tungs_types::identity::{Identity, IdentityId};
    use tungs_types::profile::UserProfile;
    use tungs_types::quota::QuotaPolicy;

    fn sample() -> Session {
        let identity = Identity::new(IdentityId::new("u1"), "ada@example.com", "Ada");
        let profile = UserProfile::default_free(&QuotaPolicy::default(), Utc::now());
        let mut session = Session::new(identity, profile, true);
        session.pending_delta = 2;
        session
    }

    #[test]
    fn encoded_record_decodes_to_same_session() {
        let session = sample();
        let raw = encode(&session).unwrap();
        assert!(raw.contains("\"pendingDelta\":2"));
        assert_eq!(decode(&raw).unwrap(), session);
    }

    #[test]
    fn truncated_record_is_corruption() {
        let raw = encode(&sample()).unwrap();
        let truncated = &raw[..raw.len() / 2];
        assert!(matches!(decode(truncated), Err(StoreError::CacheCorruption(_))));
    }

    #[test]
    fn record_missing_field_is_corruption() {
        let raw = r#"{"sessionId":"0190a8f0-0000-7000-8000-000000000000","degraded":false}"#;
        assert!(matches!(decode(raw), Err(StoreError::CacheCorruption(_))));
    }

    #[test]
    fn newer_schema_version_is_corruption() {
        let mut session = sample();
        session.schema_version = SCHEMA_VERSION + 1;
        let raw = serde_json::to_string(&session).unwrap();
        let err = decode(&raw).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }
}
