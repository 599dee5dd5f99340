//! Application state wiring the engine to its concrete adapters.
//!
//! The engine is generic over its ports; AppState pins it to the SQLite
//! session cache, the HTTP backend client, and the channel identity adapter.

use std::path::PathBuf;
use std::sync::Arc;

use tungs_core::session::{QuotaGuard, ReconciliationEngine, RetryPolicy};
use tungs_infra::backend::HttpBackendSync;
use tungs_infra::config::load_global_config;
use tungs_infra::filesystem::{ensure_data_dir, resolve_data_dir};
use tungs_infra::identity::ChannelIdentityProvider;
use tungs_infra::sqlite::pool::database_url;
use tungs_infra::sqlite::{DatabasePool, SqliteSessionStore};
use tungs_types::config::GlobalConfig;

/// Capacity of the identity provider notification queue.
///
/// One-shot commands attach no listener, so the provider's sign-out
/// announcement is dropped once the receiver is gone.
const AUTH_EVENT_CAPACITY: usize = 8;

pub type ConcreteEngine =
    ReconciliationEngine<ChannelIdentityProvider, HttpBackendSync, SqliteSessionStore>;

pub type ConcreteQuotaGuard =
    QuotaGuard<ChannelIdentityProvider, HttpBackendSync, SqliteSessionStore>;

/// Shared application state used by every CLI command.
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    pub guard: ConcreteQuotaGuard,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open the session cache, wire the engine, and restore
    /// any cached session.
    pub async fn init(backend_url: Option<String>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let mut config = load_global_config(&data_dir).await;
        if let Some(url) = backend_url {
            config.backend.base_url = url;
        }

        let pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let store = SqliteSessionStore::new(pool, config.cache.key.clone());
        let backend = HttpBackendSync::new(&config.backend)?;
        let (identity, _) = ChannelIdentityProvider::channel(AUTH_EVENT_CAPACITY);

        let engine = ReconciliationEngine::new(
            identity,
            backend,
            store,
            config.quota.clone(),
        )
        .with_retry(RetryPolicy::from(&config.retry));
        let engine = Arc::new(engine);
        engine.restore().await;

        Ok(Self {
            guard: QuotaGuard::new(Arc::clone(&engine)),
            engine,
            config,
            data_dir,
        })
    }
}
