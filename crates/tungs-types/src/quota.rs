//! Plan-to-limit quota policy.
//!
//! `QuotaPolicy` is a total mapping: every [`Plan`] resolves to a positive
//! message limit, and unknown plan names resolve to the free limit.

use serde::{Deserialize, Serialize};

use crate::profile::{Plan, UserProfile};

/// Per-plan message limits.
///
/// Loaded from the `[quota]` table of `config.toml`. All fields have defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    #[serde(default = "default_free")]
    pub free: u64,
    #[serde(default = "default_standard")]
    pub standard: u64,
    #[serde(default = "default_premium")]
    pub premium: u64,
}

fn default_free() -> u64 {
    20
}

fn default_standard() -> u64 {
    2_000
}

fn default_premium() -> u64 {
    10_000
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            free: default_free(),
            standard: default_standard(),
            premium: default_premium(),
        }
    }
}

impl QuotaPolicy {
    /// Limit for a plan. Never zero: a misconfigured zero is floored to 1.
    pub fn limit(&self, plan: Plan) -> u64 {
        let raw = match plan {
            Plan::Free => self.free,
            Plan::Standard => self.standard,
            Plan::Premium => self.premium,
        };
        raw.max(1)
    }

    /// Limit for a raw plan name; unrecognized names get the free limit.
    pub fn limit_for_name(&self, name: &str) -> u64 {
        self.limit(Plan::from_name(name))
    }

    /// Strict less-than: usage equal to the limit disallows the action.
    pub fn allows(&self, profile: &UserProfile) -> bool {
        profile.messages_used < self.limit(profile.plan)
    }
}
