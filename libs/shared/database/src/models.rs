use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One billed model call, as recorded by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEvent {
    pub timestamp: NaiveDateTime,
    pub model: String,
    pub provider: String,
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: f64,
    pub success: bool,
}

/// Host resource sample taken on every collector tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

/// Response time of a request the gateway itself served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMetric {
    pub timestamp: NaiveDateTime,
    pub response_time_ms: f64,
}

/// A log anomaly. `severity` is kept as recorded; classification into known levels
/// happens at aggregation time so unknown values are never lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub timestamp: NaiveDateTime,
    pub anomaly_type: String,
    pub severity: String,
    pub description: String,
    pub suggested_action: String,
}

/// Dimension for grouped anomaly counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyGrouping {
    Severity,
    Type,
}

/// Inclusive timestamp range. An open end means "up to the latest row".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn since(start: NaiveDateTime) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && self.end.map_or(true, |end| timestamp <= end)
    }
}
