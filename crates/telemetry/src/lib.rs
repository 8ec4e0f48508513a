//! Turn metrics for switchyard.
//!
//! Counters and a latency histogram kept in a dedicated Prometheus
//! registry and rendered in the text exposition format for `/metrics`.

pub mod metrics;

pub use metrics::{ContextFetchOutcome, Metrics, RequestStatus};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics encoding produced invalid UTF-8")]
    Encoding,
}
