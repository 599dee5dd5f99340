//! Backend-of-record client.

pub mod http;
pub mod types;

pub use http::HttpBackendSync;
