use crate::error::StoreResult;
use crate::models::{AnomalyEvent, AnomalyGrouping, CostEvent, GatewayMetric, MetricSnapshot, TimeRange};

/// Read-only access to the three telemetry datasets.
///
/// Implementations are synchronous; callers on an async runtime are expected to run
/// them on the blocking pool. Every method is a pure read, so one instance can be
/// shared across any number of concurrent requests.
pub trait EventStore: Send + Sync {
    /// Cost events in `range`, oldest first.
    fn cost_events(&self, range: &TimeRange) -> StoreResult<Vec<CostEvent>>;

    /// The most recent metric snapshot, if any has been recorded.
    fn latest_metric_snapshot(&self) -> StoreResult<Option<MetricSnapshot>>;

    /// Metric snapshots in `range`, oldest first.
    fn metric_snapshots(&self, range: &TimeRange) -> StoreResult<Vec<MetricSnapshot>>;

    /// Gateway-served request timings in `range`, oldest first.
    fn gateway_metrics(&self, range: &TimeRange) -> StoreResult<Vec<GatewayMetric>>;

    /// All-time anomaly counts grouped by the given dimension. A missing value is
    /// reported under the empty string.
    fn anomaly_counts(&self, grouping: AnomalyGrouping) -> StoreResult<Vec<(String, u64)>>;

    /// Up to `limit` anomalies in `range`, newest first.
    fn recent_anomalies(&self, range: &TimeRange, limit: usize) -> StoreResult<Vec<AnomalyEvent>>;
}
