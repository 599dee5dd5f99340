//! Observability setup for Tungs: structured logging with an optional
//! OpenTelemetry span exporter.

pub mod tracing_setup;

pub use tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
