//! Session reconciliation: the engine, quota guard, and auth-event pump.

pub mod codec;
pub mod engine;
pub mod pump;
pub mod quota;
pub mod retry;

pub use engine::{AuthOutcome, ReconciliationEngine};
pub use pump::run_auth_events;
pub use quota::{Consumption, QuotaDecision, QuotaGuard};
pub use retry::{Clock, RecordingClock, Retrier, RetryPolicy, TokioClock};
