//! Event bus for session state-transition notifications.
//!
//! Provides an `EventBus` that delivers `SessionEvent` messages to all
//! subscribers synchronously, in registration order.

pub mod bus;

pub use bus::{EventBus, SubscriptionId};
