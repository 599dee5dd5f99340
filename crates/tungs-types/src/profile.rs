use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::quota::QuotaPolicy;

/// Subscription plan gating the message quota.
///
/// Deserialization is lenient: any unrecognized plan name becomes `Free`, so
/// a plan value is never undefined past the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Plan {
    #[default]
    Free,
    Standard,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Standard, Plan::Premium];

    /// Resolve a plan name, falling back to `Free` for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "standard" => Plan::Standard,
            "premium" => Plan::Premium,
            _ => Plan::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Standard => "standard",
            Plan::Premium => "premium",
        }
    }
}

impl From<String> for Plan {
    fn from(name: String) -> Self {
        Plan::from_name(&name)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile as reported by the backend-of-record, before local derivation.
///
/// `messages_limit` is whatever the backend sent; the canonical limit is
/// always derived from the plan when building a [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub messages_used: u64,
    #[serde(default)]
    pub messages_limit: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Typed user profile. All fields are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub plan: Plan,
    pub messages_used: u64,
    pub messages_limit: u64,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl UserProfile {
    /// Build the canonical profile from a backend record.
    ///
    /// Returns the profile and whether the backend's own limit disagreed with
    /// the plan-derived one (callers log it).
    pub fn from_record(record: ProfileRecord, policy: &QuotaPolicy) -> (Self, bool) {
        let messages_limit = policy.limit(record.plan);
        let mismatch = record
            .messages_limit
            .is_some_and(|wire| wire != messages_limit);
        let profile = Self {
            plan: record.plan,
            messages_used: record.messages_used,
            messages_limit,
            created_at: record.created_at,
            last_login: record.last_login,
        };
        (profile, mismatch)
    }

    /// Default free-plan profile used when neither the backend nor the cache
    /// can supply one.
    pub fn default_free(policy: &QuotaPolicy, now: DateTime<Utc>) -> Self {
        Self {
            plan: Plan::Free,
            messages_used: 0,
            messages_limit: policy.limit(Plan::Free),
            created_at: now,
            last_login: now,
        }
    }

    /// Messages left before the plan limit (zero once at or over it).
    pub fn remaining(&self) -> u64 {
        self.messages_limit.saturating_sub(self.messages_used)
    }
}
