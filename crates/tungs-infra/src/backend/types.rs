//! Wire types for the backend-of-record REST contract.

use serde::{Deserialize, Serialize};
use tungs_types::profile::ProfileRecord;

/// `POST /profile` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub identity_id: String,
    pub email: String,
    pub display_name: String,
}

/// `POST /profile` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: ProfileRecord,
}

/// `POST /usage` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub identity_id: String,
    pub delta: u64,
}

/// `POST /usage` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub messages_used: u64,
}

/// Error body returned with any non-2xx status.
///
/// On 409, `bound_identity_id` names the identity that already owns the email.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub bound_identity_id: Option<String>,
}
