//! HttpBackendSync -- [`BackendSync`] over the backend's JSON REST API.
//!
//! The optional API token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building the `Authorization` header.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use tungs_core::repository::BackendSync;
use tungs_types::config::BackendConfig;
use tungs_types::error::SyncError;
use tungs_types::identity::{Identity, IdentityId};
use tungs_types::profile::ProfileRecord;

use super::types::{ErrorBody, ProfileRequest, ProfileResponse, UsageRequest, UsageResponse};

/// Status reported when a 2xx response body cannot be decoded. Treated like
/// a bad gateway, so it is transient.
const UNDECODABLE_STATUS: u16 = 502;

/// Backend-of-record client.
///
/// Does not derive `Debug` so the token cannot leak through it.
pub struct HttpBackendSync {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpBackendSync {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        request
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("HTTP request failed: {e}")))
    }
}

/// Read the error body of a failed response, tolerating non-JSON bodies.
async fn error_body(response: Response) -> (StatusCode, ErrorBody) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        error: (!text.is_empty()).then_some(text),
        bound_identity_id: None,
    });
    (status, body)
}

fn server_error(status: StatusCode, body: ErrorBody) -> SyncError {
    SyncError::Server {
        status: status.as_u16(),
        message: body
            .error
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
    response.json::<T>().await.map_err(|e| SyncError::Server {
        status: UNDECODABLE_STATUS,
        message: format!("failed to parse response: {e}"),
    })
}

impl BackendSync for HttpBackendSync {
    async fn upsert_profile(&self, identity: &Identity) -> Result<ProfileRecord, SyncError> {
        let body = ProfileRequest {
            identity_id: identity.id.as_str().to_string(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
        };
        let response = self.send(self.post("/profile").json(&body)).await?;

        let status = response.status();
        if status.is_success() {
            let parsed: ProfileResponse = decode(response).await?;
            debug!(identity_id = %identity.id, plan = %parsed.profile.plan, "profile upserted");
            return Ok(parsed.profile);
        }

        let (status, body) = error_body(response).await;
        if status == StatusCode::CONFLICT {
            return Err(SyncError::IdentityConflict {
                email: identity.email.clone(),
                bound_to: body.bound_identity_id,
            });
        }
        Err(server_error(status, body))
    }

    async fn update_usage(&self, identity_id: &IdentityId, delta: u64) -> Result<u64, SyncError> {
        let body = UsageRequest {
            identity_id: identity_id.as_str().to_string(),
            delta,
        };
        let response = self.send(self.post("/usage").json(&body)).await?;

        if response.status().is_success() {
            let parsed: UsageResponse = decode(response).await?;
            debug!(%identity_id, delta, messages_used = parsed.messages_used, "usage recorded");
            return Ok(parsed.messages_used);
        }

        let (status, body) = error_body(response).await;
        Err(server_error(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use tungs_types::profile::Plan;

    #[derive(Default)]
    struct Stub {
        profiles: Mutex<HashMap<String, (String, ProfileRecord)>>,
        fail_status: Mutex<Option<u16>>,
        auth_headers: Mutex<Vec<Option<String>>>,
    }

    impl Stub {
        fn record_auth(&self, headers: &HeaderMap) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.auth_headers.lock().unwrap().push(auth);
        }

        fn forced_failure(&self) -> Option<AxumResponse> {
            let status = (*self.fail_status.lock().unwrap())?;
            let status = axum::http::StatusCode::from_u16(status).unwrap();
            Some((status, Json(serde_json::json!({"error": "forced failure"}))).into_response())
        }
    }

    async fn upsert(
        State(stub): State<Arc<Stub>>,
        headers: HeaderMap,
        Json(req): Json<ProfileRequest>,
    ) -> AxumResponse {
        stub.record_auth(&headers);
        if let Some(resp) = stub.forced_failure() {
            return resp;
        }

        let mut profiles = stub.profiles.lock().unwrap();
        let owner = profiles
            .iter()
            .find(|(id, (email, _))| *email == req.email && **id != req.identity_id)
            .map(|(id, _)| id.clone());
        if let Some(owner) = owner {
            return (
                axum::http::StatusCode::CONFLICT,
                Json(serde_json::json!({"error": "email in use", "boundIdentityId": owner})),
            )
                .into_response();
        }

        let now = Utc::now();
        let (_, profile) = profiles.entry(req.identity_id).or_insert_with(|| {
            (
                req.email.clone(),
                ProfileRecord {
                    plan: Plan::Free,
                    messages_used: 0,
                    messages_limit: Some(20),
                    created_at: now,
                    last_login: now,
                },
            )
        });
        profile.last_login = now;
        Json(ProfileResponse {
            profile: profile.clone(),
        })
        .into_response()
    }

    async fn usage(State(stub): State<Arc<Stub>>, Json(req): Json<UsageRequest>) -> AxumResponse {
        if let Some(resp) = stub.forced_failure() {
            return resp;
        }
        let mut profiles = stub.profiles.lock().unwrap();
        match profiles.get_mut(&req.identity_id) {
            Some((_, profile)) => {
                profile.messages_used += req.delta;
                Json(UsageResponse {
                    messages_used: profile.messages_used,
                })
                .into_response()
            }
            None => (
                axum::http::StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "unknown identity"})),
            )
                .into_response(),
        }
    }

    async fn spawn_stub(stub: Arc<Stub>) -> String {
        let app = Router::new()
            .route("/profile", post(upsert))
            .route("/usage", post(usage))
            .route("/garbage/profile", post(|| async { "not json" }))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str, token: Option<&str>) -> HttpBackendSync {
        HttpBackendSync::new(&BackendConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            api_token: token.map(SecretString::from),
        })
        .unwrap()
    }

    fn identity(id: &str, email: &str) -> Identity {
        Identity::new(IdentityId::new(id), email, "")
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let stub = Arc::new(Stub::default());
        let backend = client(&spawn_stub(stub.clone()).await, None);
        let who = identity("u1", "u1@example.com");

        let first = backend.upsert_profile(&who).await.unwrap();
        let second = backend.upsert_profile(&who).await.unwrap();

        assert_eq!(first.plan, second.plan);
        assert_eq!(first.messages_used, second.messages_used);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(stub.profiles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_usage_is_additive() {
        let stub = Arc::new(Stub::default());
        let backend = client(&spawn_stub(stub).await, None);
        let who = identity("u1", "u1@example.com");
        backend.upsert_profile(&who).await.unwrap();

        assert_eq!(backend.update_usage(&who.id, 3).await.unwrap(), 3);
        assert_eq!(backend.update_usage(&who.id, 1).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn conflict_maps_to_identity_conflict() {
        let stub = Arc::new(Stub::default());
        let backend = client(&spawn_stub(stub).await, None);
        backend
            .upsert_profile(&identity("u9", "ada@example.com"))
            .await
            .unwrap();

        let err = backend
            .upsert_profile(&identity("u1", "ada@example.com"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SyncError::IdentityConflict {
                email: "ada@example.com".to_string(),
                bound_to: Some("u9".to_string()),
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_message() {
        let stub = Arc::new(Stub::default());
        let backend = client(&spawn_stub(stub.clone()).await, None);

        *stub.fail_status.lock().unwrap() = Some(503);
        let err = backend
            .upsert_profile(&identity("u1", "u1@example.com"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Server {
                status: 503,
                message: "forced failure".to_string(),
            }
        );
        assert!(err.is_transient());

        *stub.fail_status.lock().unwrap() = Some(400);
        let err = backend
            .update_usage(&IdentityId::new("u1"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn usage_for_unknown_identity_is_client_error() {
        let stub = Arc::new(Stub::default());
        let backend = client(&spawn_stub(stub).await, None);

        let err = backend
            .update_usage(&IdentityId::new("ghost"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn undecodable_body_is_transient() {
        let stub = Arc::new(Stub::default());
        let base = spawn_stub(stub).await;
        let backend = client(&format!("{base}/garbage"), None);

        let err = backend
            .upsert_profile(&identity("u1", "u1@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 502, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = client(&format!("http://{addr}"), None);
        let err = backend
            .upsert_profile(&identity("u1", "u1@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn bearer_token_sent_when_configured() {
        let stub = Arc::new(Stub::default());
        let base = spawn_stub(stub.clone()).await;

        client(&base, Some("tok-123"))
            .upsert_profile(&identity("u1", "u1@example.com"))
            .await
            .unwrap();
        client(&base, None)
            .upsert_profile(&identity("u2", "u2@example.com"))
            .await
            .unwrap();

        assert_eq!(
            *stub.auth_headers.lock().unwrap(),
            vec![Some("Bearer tok-123".to_string()), None]
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = client("http://localhost:3001/", None);
        assert_eq!(backend.base_url(), "http://localhost:3001");
    }
}
