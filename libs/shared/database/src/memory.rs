use std::collections::BTreeMap;

use crate::error::StoreResult;
use crate::models::{AnomalyEvent, AnomalyGrouping, CostEvent, GatewayMetric, MetricSnapshot, TimeRange};
use crate::store::EventStore;

/// EventStore over in-process vectors, with the same range semantics as the SQLite
/// store. Rows are fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    cost_events: Vec<CostEvent>,
    metric_snapshots: Vec<MetricSnapshot>,
    gateway_metrics: Vec<GatewayMetric>,
    anomalies: Vec<AnomalyEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost_events(mut self, events: impl IntoIterator<Item = CostEvent>) -> Self {
        self.cost_events.extend(events);
        self.cost_events.sort_by_key(|e| e.timestamp);
        self
    }

    pub fn with_metric_snapshots(mut self, snapshots: impl IntoIterator<Item = MetricSnapshot>) -> Self {
        self.metric_snapshots.extend(snapshots);
        self.metric_snapshots.sort_by_key(|s| s.timestamp);
        self
    }

    pub fn with_gateway_metrics(mut self, metrics: impl IntoIterator<Item = GatewayMetric>) -> Self {
        self.gateway_metrics.extend(metrics);
        self.gateway_metrics.sort_by_key(|m| m.timestamp);
        self
    }

    pub fn with_anomalies(mut self, anomalies: impl IntoIterator<Item = AnomalyEvent>) -> Self {
        self.anomalies.extend(anomalies);
        self.anomalies.sort_by_key(|a| a.timestamp);
        self
    }
}

fn in_range<T, F>(rows: &[T], range: &TimeRange, timestamp: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> chrono::NaiveDateTime,
{
    rows.iter()
        .filter(|row| range.contains(timestamp(*row)))
        .cloned()
        .collect()
}

impl EventStore for MemoryEventStore {
    fn cost_events(&self, range: &TimeRange) -> StoreResult<Vec<CostEvent>> {
        Ok(in_range(&self.cost_events, range, |e| e.timestamp))
    }

    fn latest_metric_snapshot(&self) -> StoreResult<Option<MetricSnapshot>> {
        Ok(self.metric_snapshots.last().cloned())
    }

    fn metric_snapshots(&self, range: &TimeRange) -> StoreResult<Vec<MetricSnapshot>> {
        Ok(in_range(&self.metric_snapshots, range, |s| s.timestamp))
    }

    fn gateway_metrics(&self, range: &TimeRange) -> StoreResult<Vec<GatewayMetric>> {
        Ok(in_range(&self.gateway_metrics, range, |m| m.timestamp))
    }

    fn anomaly_counts(&self, grouping: AnomalyGrouping) -> StoreResult<Vec<(String, u64)>> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for anomaly in &self.anomalies {
            let key = match grouping {
                AnomalyGrouping::Severity => &anomaly.severity,
                AnomalyGrouping::Type => &anomaly.anomaly_type,
            };
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    fn recent_anomalies(&self, range: &TimeRange, limit: usize) -> StoreResult<Vec<AnomalyEvent>> {
        Ok(self
            .anomalies
            .iter()
            .rev()
            .filter(|a| range.contains(a.timestamp))
            .take(limit)
            .cloned()
            .collect())
    }
}
