//! Port trait definitions.
//!
//! These traits define the identity, backend, and storage interfaces that
//! the infrastructure layer (tungs-infra) implements. The core crate never
//! depends on a specific transport or storage technology.

pub mod backend;
pub mod identity;
pub mod store;

pub use backend::BackendSync;
pub use identity::IdentityProvider;
pub use store::{MemorySessionStore, SessionStore};
