//! Backend-of-record port.

use std::sync::Arc;

use tungs_types::error::SyncError;
use tungs_types::identity::{Identity, IdentityId};
use tungs_types::profile::ProfileRecord;

/// Remote authority for plan and usage.
///
/// Implementations live in tungs-infra. Every call may fail with
/// [`SyncError`]; the engine decides what is retried.
pub trait BackendSync: Send + Sync {
    /// Ensure a profile exists for the identity and return it.
    ///
    /// Idempotent: calling twice with the same identity yields the same
    /// profile, apart from `last_login`. Fails with
    /// [`SyncError::IdentityConflict`] if the email is bound to another id.
    fn upsert_profile(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<ProfileRecord, SyncError>> + Send;

    /// Add `delta` to the identity's usage counter and return the new total.
    ///
    /// Additive, never overwriting, so concurrent writers from other devices
    /// are not lost.
    fn update_usage(
        &self,
        identity_id: &IdentityId,
        delta: u64,
    ) -> impl std::future::Future<Output = Result<u64, SyncError>> + Send;
}

impl<T: BackendSync> BackendSync for Arc<T> {
    async fn upsert_profile(&self, identity: &Identity) -> Result<ProfileRecord, SyncError> {
        (**self).upsert_profile(identity).await
    }

    async fn update_usage(&self, identity_id: &IdentityId, delta: u64) -> Result<u64, SyncError> {
        (**self).update_usage(identity_id, delta).await
    }
}
