use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for a [`RelayerService`](crate::transactions::RelayerService).
#[derive(Metrics)]
#[metrics(scope = "relayer")]
pub struct RelayerMetrics {
    /// Number of broadcast envelopes.
    pub sent: Counter,
    /// Number of jobs that failed.
    pub failed: Counter,
    /// Number of completed jobs
    pub confirmed: Counter,
    /// Number of jobs put back into the pool after a transient failure.
    pub requeued: Counter,
    /// Number of jobs waiting in the pool.
    pub queued: Gauge,
    /// Number of jobs being executed.
    pub in_flight: Gauge,
    /// Time from submission to confirmation, in milliseconds.
    pub confirmation_time: Histogram,
    /// Number of closed nonce gaps
    pub closed_nonce_gaps: Counter,
}
