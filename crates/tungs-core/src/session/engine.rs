//! Session reconciliation engine.
//!
//! Merges the identity provider's assertion, the backend-of-record profile,
//! and the local cache into one canonical [`Session`]. Every transition
//! (sign-in, flush, reconcile, quota check) runs under a single transition
//! lock, so callers never observe a half-merged session.
//!
//! Sign-out is the exception: it never waits for an in-flight transition.
//! It bumps a generation counter, and any transition that started under an
//! older generation discards its result instead of committing it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tungs_types::error::{SessionError, SyncError};
use tungs_types::event::{AuthEvent, SessionEvent};
use tungs_types::identity::{Identity, IdentityId};
use tungs_types::profile::{ProfileRecord, UserProfile};
use tungs_types::quota::QuotaPolicy;
use tungs_types::session::{Session, SessionPhase};

use super::retry::{Clock, Retrier, RetryPolicy, TokioClock};
use crate::event::EventBus;
use crate::repository::{BackendSync, IdentityProvider, SessionStore};

// ---------------------------------------------------------------------------
// AuthOutcome
// ---------------------------------------------------------------------------

/// Result of handling an auth event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The session is reconciled with the backend.
    Ready(Session),
    /// The session is running on local data.
    Degraded(Session),
    /// The active session was cleared.
    Cleared,
    /// Sign-out with nothing to clear.
    AlreadySignedOut,
    /// A sign-out arrived while this sign-in was in flight; its result was
    /// discarded.
    Superseded,
}

impl AuthOutcome {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthOutcome::Ready(session) | AuthOutcome::Degraded(session) => Some(session),
            _ => None,
        }
    }
}

/// Which event a commit publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Announce {
    Ready,
    Degraded,
    Silent,
}

#[derive(Debug, Default)]
struct Slot {
    phase: SessionPhase,
    session: Option<Session>,
    generation: u64,
}

// ---------------------------------------------------------------------------
// ReconciliationEngine
// ---------------------------------------------------------------------------

/// Owner of the canonical session.
///
/// Generic over its ports so tests can substitute in-memory fakes. Share it
/// behind an `Arc`.
pub struct ReconciliationEngine<I, B, S> {
    identity: I,
    backend: B,
    store: S,
    policy: QuotaPolicy,
    bus: EventBus,
    retrier: Retrier,
    pub(super) transition: Mutex<()>,
    slot: Mutex<Slot>,
}

impl<I, B, S> ReconciliationEngine<I, B, S>
where
    I: IdentityProvider,
    B: BackendSync,
    S: SessionStore,
{
    pub fn new(identity: I, backend: B, store: S, policy: QuotaPolicy) -> Self {
        Self {
            identity,
            backend,
            store,
            policy,
            bus: EventBus::new(),
            retrier: Retrier::new(RetryPolicy::default(), Arc::new(TokioClock)),
            transition: Mutex::new(()),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retrier = self.retrier.with_policy(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retrier = Retrier::new(self.retrier.policy(), clock);
        self
    }

    /// Publish through an existing bus instead of a private one.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub(super) fn backend(&self) -> &B {
        &self.backend
    }

    pub(super) fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Single-attempt variant used when probing reachability.
    pub(super) fn probe_retrier(&self) -> Retrier {
        self.retrier.with_policy(RetryPolicy::single_attempt())
    }

    /// Current phase. Does not wait for in-flight transitions, so it may
    /// report `Authenticating`.
    pub async fn phase(&self) -> SessionPhase {
        self.slot.lock().await.phase
    }

    /// The settled canonical session, waiting for any in-flight transition.
    pub async fn current_session(&self) -> Option<Session> {
        let _turn = self.transition.lock().await;
        self.slot.lock().await.session.clone()
    }

    /// Route an auth event to sign-in or sign-out.
    pub async fn on_auth_event(&self, event: AuthEvent) -> Result<AuthOutcome, SessionError> {
        debug!(event = event.kind(), "handling auth event");
        match event {
            AuthEvent::Authenticated { identity } => self.sign_in(identity).await,
            AuthEvent::SignedOut => Ok(self.sign_out().await),
        }
    }

    /// Adopt a cached session at startup, before any auth event arrives.
    ///
    /// The cached session is treated as degraded until the backend confirms
    /// it. A missing or unreadable record leaves the engine signed out.
    pub async fn restore(&self) -> Option<Session> {
        let _turn = self.transition.lock().await;
        let mut slot = self.slot.lock().await;
        if let Some(session) = &slot.session {
            return Some(session.clone());
        }

        let Some(mut session) = self.load_cache().await else {
            debug!("no cached session to restore");
            return None;
        };
        session.degraded = true;
        session.profile.messages_limit = self.policy.limit(session.profile.plan);
        if let Err(e) = self.store.set(&session).await {
            warn!(error = %e, "failed to persist restored session");
        }

        info!(
            identity_id = %session.identity.id,
            pending = session.pending_delta,
            "restored cached session"
        );
        slot.phase = SessionPhase::Degraded;
        slot.session = Some(session.clone());
        self.bus.publish(SessionEvent::SessionDegraded {
            session: session.clone(),
        });
        Some(session)
    }

    /// Reconcile a freshly authenticated identity with the backend.
    ///
    /// Transient backend failures fall back to a degraded session built from
    /// the cache (or a default free profile). An identity conflict or a 4xx
    /// rejection fails the sign-in and leaves the prior session in place.
    pub async fn sign_in(&self, identity: Identity) -> Result<AuthOutcome, SessionError> {
        let identity = identity.normalized();
        let _turn = self.transition.lock().await;

        let (generation, prior_phase) = {
            let mut slot = self.slot.lock().await;
            let prior = slot.phase;
            slot.phase = SessionPhase::Authenticating;
            (slot.generation, prior)
        };
        info!(identity_id = %identity.id, "reconciling session");

        let cached = self.cached_for(&identity.id).await;
        let upsert = self
            .retrier
            .run("upsert_profile", || self.backend.upsert_profile(&identity))
            .await;

        let (session, announce) = match upsert {
            Ok(record) => {
                let mut session = self.merge(identity, record, cached.as_ref());
                if let Err(err) = self.flush(&self.retrier, &mut session).await {
                    warn!(
                        identity_id = %session.identity.id,
                        pending = session.pending_delta,
                        error = %err,
                        "could not flush cached usage, continuing degraded"
                    );
                    session.degraded = true;
                }
                let announce = if session.degraded {
                    Announce::Degraded
                } else {
                    Announce::Ready
                };
                (session, announce)
            }
            Err(SyncError::IdentityConflict { email, bound_to }) => {
                self.restore_phase(generation, prior_phase).await;
                warn!(%email, ?bound_to, "email is bound to a different identity");
                return Err(SessionError::IdentityConflict { email, bound_to });
            }
            Err(SyncError::Server { status, message }) if status < 500 => {
                self.restore_phase(generation, prior_phase).await;
                warn!(status, %message, "backend rejected sign-in");
                return Err(SessionError::Server { status, message });
            }
            Err(err) => {
                warn!(
                    identity_id = %identity.id,
                    error = %err,
                    "backend unreachable, continuing degraded"
                );
                (self.degraded_session(identity, cached), Announce::Degraded)
            }
        };

        Ok(match self.commit(generation, session, announce).await {
            Some(session) if session.degraded => AuthOutcome::Degraded(session),
            Some(session) => AuthOutcome::Ready(session),
            None => AuthOutcome::Superseded,
        })
    }

    /// Clear the session and the cache. Idempotent.
    ///
    /// Does not wait for in-flight transitions; they observe the new
    /// generation and discard their results.
    pub async fn sign_out(&self) -> AuthOutcome {
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        let previous = slot.session.take();
        let was_active = previous.is_some() || slot.phase != SessionPhase::SignedOut;
        slot.phase = SessionPhase::SignedOut;

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear session cache");
        }

        if !was_active {
            debug!("sign-out with no active session");
            return AuthOutcome::AlreadySignedOut;
        }
        if let Some(previous) = &previous {
            if previous.pending_delta > 0 {
                warn!(
                    identity_id = %previous.identity.id,
                    pending = previous.pending_delta,
                    "discarding unsynced usage on sign-out"
                );
            }
            info!(identity_id = %previous.identity.id, "signed out");
        }
        self.bus.publish(SessionEvent::SessionCleared {});
        AuthOutcome::Cleared
    }

    /// Sign out at the identity provider, then locally.
    ///
    /// Local state is cleared even if the provider call fails; the provider
    /// error is still returned.
    pub async fn logout(&self) -> Result<AuthOutcome, SessionError> {
        let provider = self.identity.sign_out().await;
        if let Err(e) = &provider {
            warn!(error = %e, "identity provider sign-out failed, clearing local session anyway");
        }
        let outcome = self.sign_out().await;
        provider.map(|()| outcome).map_err(SessionError::from)
    }

    /// Flush queued usage and refresh the profile once the backend is
    /// reachable again.
    ///
    /// Sends the whole pending delta in one additive call. Returns the
    /// reconciled session, `Ok(None)` with no session, or the backend error
    /// if it is still unreachable (the session stays degraded).
    pub async fn reconcile_pending(&self) -> Result<Option<Session>, SyncError> {
        let _turn = self.transition.lock().await;
        self.reconcile_locked(&self.retrier).await
    }

    /// Reconcile body. Caller holds the transition lock.
    pub(super) async fn reconcile_locked(
        &self,
        retrier: &Retrier,
    ) -> Result<Option<Session>, SyncError> {
        let Some((generation, mut session)) = self.snapshot().await else {
            return Ok(None);
        };
        if !session.degraded && session.pending_delta == 0 {
            return Ok(Some(session));
        }

        // The profile may never have reached the backend if the session was
        // created while degraded, so upsert before flushing usage against it.
        let record = retrier
            .run("upsert_profile", || self.backend.upsert_profile(&session.identity))
            .await?;
        self.refresh_profile(&mut session, record);

        let flushed = session.pending_delta;
        self.flush(retrier, &mut session).await?;
        session.degraded = false;

        info!(
            identity_id = %session.identity.id,
            flushed,
            messages_used = session.profile.messages_used,
            "reconciled with backend"
        );
        Ok(self.commit(generation, session, Announce::Ready).await)
    }

    /// Generation and clone of the canonical session, if any.
    pub(super) async fn snapshot(&self) -> Option<(u64, Session)> {
        let slot = self.slot.lock().await;
        slot.session.clone().map(|s| (slot.generation, s))
    }

    /// Make `session` canonical and persist it, unless a sign-out happened
    /// since `generation` was read.
    pub(super) async fn commit(
        &self,
        generation: u64,
        session: Session,
        announce: Announce,
    ) -> Option<Session> {
        let mut slot = self.slot.lock().await;
        if slot.generation != generation {
            debug!(
                identity_id = %session.identity.id,
                "discarding result superseded by sign-out"
            );
            return None;
        }

        if let Err(e) = self.store.set(&session).await {
            warn!(error = %e, "failed to persist session");
        }
        slot.phase = SessionPhase::settled(&session);
        slot.session = Some(session.clone());

        // Published under the slot lock so subscribers see events in commit
        // order relative to sign-out.
        match announce {
            Announce::Ready => {
                self.bus.publish(SessionEvent::SessionReady {
                    session: session.clone(),
                });
            }
            Announce::Degraded => {
                self.bus.publish(SessionEvent::SessionDegraded {
                    session: session.clone(),
                });
            }
            Announce::Silent => {}
        }
        Some(session)
    }

    /// Send the session's pending delta in one additive call.
    pub(super) async fn flush(&self, retrier: &Retrier, session: &mut Session) -> Result<(), SyncError> {
        let delta = session.pending_delta;
        if delta == 0 {
            return Ok(());
        }
        let id = session.identity.id.clone();
        let confirmed = retrier
            .run("update_usage", || self.backend.update_usage(&id, delta))
            .await?;
        session.pending_delta = 0;
        apply_confirmed(session, confirmed);
        Ok(())
    }

    async fn restore_phase(&self, generation: u64, phase: SessionPhase) {
        let mut slot = self.slot.lock().await;
        if slot.generation == generation {
            slot.phase = phase;
        }
    }

    /// Read the store, treating any failure as an absent record.
    async fn load_cache(&self) -> Option<Session> {
        match self.store.get().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session cache unavailable, treating as empty");
                None
            }
        }
    }

    /// The local session to merge with, if it belongs to `id`.
    ///
    /// Sessions of other identities are never merged.
    async fn cached_for(&self, id: &IdentityId) -> Option<Session> {
        let current = self.slot.lock().await.session.clone();
        let cached = match current {
            Some(session) => Some(session),
            None => self.load_cache().await,
        }?;

        if cached.belongs_to(id) {
            return Some(cached);
        }
        info!(
            previous = %cached.identity.id,
            pending = cached.pending_delta,
            "ignoring cached session of a different identity"
        );
        None
    }

    fn merge(&self, identity: Identity, record: ProfileRecord, cached: Option<&Session>) -> Session {
        let wire_limit = record.messages_limit;
        let (profile, mismatch) = UserProfile::from_record(record, &self.policy);
        if mismatch {
            debug!(
                identity_id = %identity.id,
                plan = %profile.plan,
                wire_limit = ?wire_limit,
                limit = profile.messages_limit,
                "backend limit disagrees with plan, using plan limit"
            );
        }

        let mut session = Session::new(identity, profile, false);
        if let Some(pending) = cached.map(|c| c.pending_delta).filter(|p| *p > 0) {
            session.pending_delta = pending;
            session.profile.messages_used = session.profile.messages_used.saturating_add(pending);
        }
        session
    }

    fn degraded_session(&self, identity: Identity, cached: Option<Session>) -> Session {
        let now = Utc::now();
        match cached {
            Some(cached) => {
                let mut profile = cached.profile;
                profile.messages_limit = self.policy.limit(profile.plan);
                profile.last_login = now;
                let mut session = Session::new(identity, profile, true);
                session.pending_delta = cached.pending_delta;
                session
            }
            None => Session::new(identity, UserProfile::default_free(&self.policy, now), true),
        }
    }

    /// Take plan and dates from the backend. Usage is the larger of the local
    /// count and the backend total plus what is still pending.
    fn refresh_profile(&self, session: &mut Session, record: ProfileRecord) {
        let (fresh, _) = UserProfile::from_record(record, &self.policy);
        let messages_used = session
            .profile
            .messages_used
            .max(fresh.messages_used.saturating_add(session.pending_delta));
        session.profile = UserProfile {
            messages_used,
            ..fresh
        };
    }
}

/// Fold a backend-confirmed total into the local count. Usage never goes
/// backwards.
pub(super) fn apply_confirmed(session: &mut Session, confirmed: u64) {
    if confirmed < session.profile.messages_used {
        debug!(
            local = session.profile.messages_used,
            confirmed, "backend total behind local count, keeping local"
        );
    }
    session.profile.messages_used = session.profile.messages_used.max(confirmed);
}

impl<I, B, S> std::fmt::Debug for ReconciliationEngine<I, B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("policy", &self.policy)
            .field("retrier", &self.retrier)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
