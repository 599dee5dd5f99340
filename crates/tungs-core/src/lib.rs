//! Session reconciliation engine and port definitions for Tungs.
//!
//! This crate defines the "ports" (identity provider, backend-of-record,
//! session store) that the infrastructure layer implements, and the engine
//! that merges them into one canonical session. It depends only on
//! `tungs-types` -- never on `tungs-infra` or any database/IO crate.

pub mod event;
pub mod repository;
pub mod session;
