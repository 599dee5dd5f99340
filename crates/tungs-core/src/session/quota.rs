//! Quota enforcement for the canonical session.
//!
//! `QuotaGuard` decides whether the user may send another message and
//! records usage. Both operations share the engine's transition lock, so a
//! check or increment issued mid sign-in waits for the merged session.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use tungs_types::error::QuotaError;
use tungs_types::event::SessionEvent;
use tungs_types::profile::UserProfile;
use tungs_types::quota::QuotaPolicy;
use tungs_types::session::Session;

use super::engine::{Announce, ReconciliationEngine, apply_confirmed};
use crate::repository::{BackendSync, IdentityProvider, SessionStore};

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum QuotaDecision {
    Allowed { remaining: u64 },
    Exceeded { used: u64, limit: u64 },
}

impl QuotaDecision {
    pub fn evaluate(profile: &UserProfile, policy: &QuotaPolicy) -> Self {
        let limit = policy.limit(profile.plan);
        if policy.allows(profile) {
            QuotaDecision::Allowed {
                remaining: limit - profile.messages_used,
            }
        } else {
            QuotaDecision::Exceeded {
                used: profile.messages_used,
                limit,
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

/// Result of [`QuotaGuard::try_consume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumption {
    /// Usage was recorded; carries the updated session.
    Recorded(Session),
    /// The quota is exhausted; nothing was recorded.
    Denied(QuotaDecision),
}

/// Gatekeeper for message sends.
pub struct QuotaGuard<I, B, S> {
    engine: Arc<ReconciliationEngine<I, B, S>>,
}

impl<I, B, S> Clone for QuotaGuard<I, B, S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<I, B, S> QuotaGuard<I, B, S>
where
    I: IdentityProvider,
    B: BackendSync,
    S: SessionStore,
{
    pub fn new(engine: Arc<ReconciliationEngine<I, B, S>>) -> Self {
        Self { engine }
    }

    /// Pure check against a given session. Fails closed at the limit.
    pub fn can_proceed(&self, session: &Session) -> bool {
        self.engine.policy().allows(&session.profile)
    }

    /// Check the canonical session.
    ///
    /// A degraded session first gets one single-attempt reconciliation probe.
    /// If the backend is still unreachable the local view decides. A denial
    /// publishes `quota-exceeded`.
    pub async fn check(&self) -> Result<QuotaDecision, QuotaError> {
        let _turn = self.engine.transition.lock().await;
        self.check_locked().await
    }

    /// Count one sent message.
    ///
    /// Synced immediately when the session is reconciled. If that fails, or
    /// the session is already degraded, the increment is queued locally and
    /// flushed on the next reconciliation.
    pub async fn record_usage(&self) -> Result<Session, QuotaError> {
        let _turn = self.engine.transition.lock().await;
        self.record_locked().await
    }

    /// Check and record in one step, with no other transition in between.
    pub async fn try_consume(&self) -> Result<Consumption, QuotaError> {
        let _turn = self.engine.transition.lock().await;
        match self.check_locked().await? {
            QuotaDecision::Allowed { .. } => Ok(Consumption::Recorded(self.record_locked().await?)),
            denied => Ok(Consumption::Denied(denied)),
        }
    }

    async fn check_locked(&self) -> Result<QuotaDecision, QuotaError> {
        let engine = &self.engine;
        let Some((_, mut session)) = engine.snapshot().await else {
            return Err(QuotaError::NoSession);
        };

        if session.degraded {
            match engine.reconcile_locked(&engine.probe_retrier()).await {
                Ok(Some(reconciled)) => session = reconciled,
                Ok(None) => return Err(QuotaError::NoSession),
                Err(err) => debug!(error = %err, "backend still unreachable, using local view"),
            }
        }

        let decision = QuotaDecision::evaluate(&session.profile, engine.policy());
        if let QuotaDecision::Exceeded { used, limit } = decision {
            info!(
                identity_id = %session.identity.id,
                plan = %session.profile.plan,
                used,
                limit,
                "message quota exceeded"
            );
            engine.bus().publish(SessionEvent::QuotaExceeded { session });
        }
        Ok(decision)
    }

    async fn record_locked(&self) -> Result<Session, QuotaError> {
        let engine = &self.engine;
        let Some((generation, mut session)) = engine.snapshot().await else {
            return Err(QuotaError::NoSession);
        };
        session.profile.messages_used = session.profile.messages_used.saturating_add(1);

        let announce = if session.degraded {
            session.pending_delta += 1;
            debug!(pending = session.pending_delta, "queued usage while degraded");
            Announce::Silent
        } else {
            let id = session.identity.id.clone();
            match engine
                .retrier()
                .run("update_usage", || engine.backend().update_usage(&id, 1))
                .await
            {
                Ok(confirmed) => {
                    apply_confirmed(&mut session, confirmed);
                    Announce::Silent
                }
                Err(err) => {
                    warn!(identity_id = %id, error = %err, "usage sync failed, queuing locally");
                    session.pending_delta += 1;
                    session.degraded = true;
                    Announce::Degraded
                }
            }
        };

        engine
            .commit(generation, session, announce)
            .await
            .ok_or(QuotaError::NoSession)
    }
}

impl<I, B, S> std::fmt::Debug for QuotaGuard<I, B, S>
where
    I: IdentityProvider,
    B: BackendSync,
    S: SessionStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGuard")
            .field("policy", self.engine.policy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemorySessionStore;
    use crate::session::engine::AuthOutcome;
    use crate::session::test_support::{Harness, MockBackend, MockIdentity, user};
    use chrono::Utc;
    use tungs_types::profile::Plan;

    type TestGuard = QuotaGuard<Arc<MockIdentity>, Arc<MockBackend>, Arc<MemorySessionStore>>;

    fn guard(h: &Harness) -> TestGuard {
        QuotaGuard::new(h.engine.clone())
    }

    #[test]
    fn decision_is_strict_at_limit() {
        let policy = QuotaPolicy::default();
        let mut profile = UserProfile::default_free(&policy, Utc::now());

        profile.messages_used = 19;
        assert_eq!(
            QuotaDecision::evaluate(&profile, &policy),
            QuotaDecision::Allowed { remaining: 1 }
        );

        profile.messages_used = 20;
        assert_eq!(
            QuotaDecision::evaluate(&profile, &policy),
            QuotaDecision::Exceeded { used: 20, limit: 20 }
        );
    }

    #[tokio::test]
    async fn standard_plan_last_message_then_exceeded() {
        let h = Harness::new();
        h.backend.seed("u1", "u1@example.com", Plan::Standard, 1999);
        h.engine.sign_in(user("u1")).await.unwrap();
        let guard = guard(&h);

        assert_eq!(guard.check().await.unwrap(), QuotaDecision::Allowed { remaining: 1 });

        let session = guard.record_usage().await.unwrap();
        assert_eq!(session.profile.messages_used, 2000);
        assert_eq!(h.backend.used("u1"), 2000);
        assert!(!guard.can_proceed(&session));

        assert_eq!(
            guard.check().await.unwrap(),
            QuotaDecision::Exceeded {
                used: 2000,
                limit: 2000
            }
        );
        assert_eq!(h.events(), vec!["session-ready", "quota-exceeded"]);
    }

    #[tokio::test]
    async fn no_session_is_an_error() {
        let h = Harness::new();
        let guard = guard(&h);
        assert_eq!(guard.check().await.unwrap_err(), QuotaError::NoSession);
        assert_eq!(guard.record_usage().await.unwrap_err(), QuotaError::NoSession);
    }

    #[tokio::test]
    async fn failed_sync_degrades_and_queues() {
        let h = Harness::new();
        h.engine.sign_in(user("u1")).await.unwrap();
        let guard = guard(&h);

        h.backend.set_reachable(false);
        let session = guard.record_usage().await.unwrap();

        assert!(session.degraded);
        assert_eq!(session.pending_delta, 1);
        assert_eq!(session.profile.messages_used, 1);
        assert_eq!(h.events(), vec!["session-ready", "session-degraded"]);
        assert_eq!(h.store.get().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn degraded_check_probes_backend_once() {
        let h = Harness::new();
        h.backend.set_reachable(false);
        h.engine.sign_in(user("u1")).await.unwrap();
        let guard = guard(&h);
        let upserts_before = h.backend.upsert_calls();

        // Still unreachable: one probe attempt, local view decides.
        assert!(guard.check().await.unwrap().is_allowed());
        assert_eq!(h.backend.upsert_calls(), upserts_before + 1);
        assert!(h.engine.current_session().await.unwrap().degraded);

        h.backend.set_reachable(true);
        assert!(guard.check().await.unwrap().is_allowed());
        let session = h.engine.current_session().await.unwrap();
        assert!(!session.degraded);
        assert_eq!(h.events(), vec!["session-degraded", "session-ready"]);
    }

    #[tokio::test]
    async fn degraded_session_fails_closed_at_local_limit() {
        let h = Harness::new();
        h.backend.set_reachable(false);
        h.engine.sign_in(user("u1")).await.unwrap();
        let guard = guard(&h);

        for _ in 0..20 {
            guard.record_usage().await.unwrap();
        }

        let decision = guard.check().await.unwrap();
        assert_eq!(decision, QuotaDecision::Exceeded { used: 20, limit: 20 });
        assert!(h.backend.usage_calls().is_empty());
    }

    #[tokio::test]
    async fn try_consume_records_until_denied() {
        let h = Harness::new();
        h.backend.seed("u1", "u1@example.com", Plan::Free, 19);
        h.engine.sign_in(user("u1")).await.unwrap();
        let guard = guard(&h);

        match guard.try_consume().await.unwrap() {
            Consumption::Recorded(session) => assert_eq!(session.profile.messages_used, 20),
            other => panic!("expected recorded, got {other:?}"),
        }
        match guard.try_consume().await.unwrap() {
            Consumption::Denied(decision) => assert!(!decision.is_allowed()),
            other => panic!("expected denied, got {other:?}"),
        }
        assert_eq!(h.backend.used("u1"), 20);
    }

    #[tokio::test]
    async fn sign_out_during_usage_sync_discards_increment() {
        let h = Harness::new();
        h.engine.sign_in(user("u1")).await.unwrap();
        let (entered, release) = h.backend.gate_next_usage();

        let guard = guard(&h);
        let record = tokio::spawn(async move { guard.record_usage().await });
        entered.notified().await;

        assert_eq!(h.engine.sign_out().await, AuthOutcome::Cleared);
        release.notify_one();

        assert_eq!(record.await.unwrap().unwrap_err(), QuotaError::NoSession);
        assert!(h.engine.current_session().await.is_none());
        assert!(h.store.raw().is_none());
        assert_eq!(h.events(), vec!["session-ready", "session-cleared"]);
    }

    #[tokio::test]
    async fn record_usage_saturates_at_max_total() {
        let h = Harness::new();
        h.backend.seed("u1", "u1@example.com", Plan::Premium, u64::MAX);
        h.engine.sign_in(user("u1")).await.unwrap();

        let session = guard(&h).record_usage().await.unwrap();
        assert_eq!(session.profile.messages_used, u64::MAX);
        assert!(!session.degraded);
    }
}
