//! Shared domain types for Tungs.
//!
//! This crate contains the core domain types used across the session engine:
//! Identity, UserProfile, Session, QuotaPolicy, the auth/session events, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod profile;
pub mod quota;
pub mod session;
