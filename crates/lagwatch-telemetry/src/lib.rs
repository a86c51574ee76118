//! Tracing subscriber setup shared by the lagwatch binaries.

mod subscriber;

pub use subscriber::{init_subscriber, TelemetryConfig, TelemetryError};
