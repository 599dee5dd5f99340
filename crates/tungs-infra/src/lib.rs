//! Infrastructure layer for Tungs.
//!
//! Contains implementations of the port traits defined in `tungs-core`:
//! the SQLite session cache, the HTTP backend-of-record client, and the
//! channel-backed identity provider adapter. Also loads `config.toml` and
//! resolves the data directory.

pub mod backend;
pub mod config;
pub mod filesystem;
pub mod identity;
pub mod sqlite;
