//! Identity provider port.

use std::sync::Arc;

use tungs_types::error::IdentityError;

/// External authentication service.
///
/// Auth events arrive separately as [`tungs_types::event::AuthEvent`]s;
/// this trait covers the calls the engine makes back into the provider.
pub trait IdentityProvider: Send + Sync {
    /// End the provider-side session.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), IdentityError>> + Send;
}

impl<T: IdentityProvider> IdentityProvider for Arc<T> {
    async fn sign_out(&self) -> Result<(), IdentityError> {
        (**self).sign_out().await
    }
}
