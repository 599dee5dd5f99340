//! SQLite storage for the local session cache.

pub mod pool;
pub mod session_store;

pub use pool::DatabasePool;
pub use session_store::SqliteSessionStore;
