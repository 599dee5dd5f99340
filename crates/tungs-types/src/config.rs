//! Global configuration types for Tungs.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! backend-of-record endpoint, per-plan quota limits, the retry policy, and
//! the session cache key.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::quota::QuotaPolicy;

/// Top-level configuration.
///
/// Loaded from `~/.tungs/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub quota: QuotaPolicy,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Backend-of-record connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional bearer token sent with every request.
    #[serde(default, skip_serializing, deserialize_with = "deserialize_token")]
    pub api_token: Option<SecretString>,
}

fn deserialize_token<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|t| !t.is_empty()).map(SecretString::from))
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_token: None,
        }
    }
}

/// Retry settings for backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt. Clamped to 1 when applied.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed backoff between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Local session cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Well-known key the session record is stored under.
    #[serde(default = "default_cache_key")]
    pub key: String,
}

fn default_cache_key() -> String {
    "tungs_user".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.backend.base_url, "http://localhost:3001");
        assert_eq!(config.backend.timeout_secs, 10);
        assert!(config.backend.api_token.is_none());
        assert_eq!(config.quota, QuotaPolicy::default());
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.backoff_ms, 500);
        assert_eq!(config.cache.key, "tungs_user");
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.quota.free, 20);
        assert_eq!(config.cache.key, "tungs_user");
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[backend]
base_url = "https://api.example.com"
timeout_secs = 3
api_token = "tok-123"

[quota]
standard = 1500

[retry]
backoff_ms = 50

[cache]
key = "other_user"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.base_url, "https://api.example.com");
        assert_eq!(config.backend.timeout_secs, 3);
        assert_eq!(
            config.backend.api_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("tok-123".to_string())
        );
        assert_eq!(config.quota.standard, 1500);
        assert_eq!(config.quota.premium, 10_000);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.backoff_ms, 50);
        assert_eq!(config.cache.key, "other_user");
    }

    #[test]
    fn test_api_token_never_serialized() {
        let mut config = GlobalConfig::default();
        config.backend.api_token = Some(SecretString::from("tok-123"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("tok-123"));
        assert!(!json.contains("api_token"));
    }
}
