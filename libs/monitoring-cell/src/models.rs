// =====================================================================================
// MONITORING CELL MODELS
// =====================================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use shared_database::{AnomalyEvent, StoreError};

// =====================================================================================
// GATEWAY
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub running: bool,
    pub healthy: bool,
    pub http_status: u16,
    pub response_time_ms: f64,
    pub port_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: NaiveDateTime,
}

// =====================================================================================
// COSTS
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSnapshot {
    pub timestamp: NaiveDateTime,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub by_model: ModelCosts,
    pub trend_7d: Vec<DailyCost>,
    #[serde(rename = "prediction")]
    pub projection: CostProjection,
    pub stats: CostStats,
}

/// Per-model cost keyed by `provider/model`, kept in descending cost order. Serialises
/// as a JSON object whose keys appear in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCosts(pub Vec<(String, f64)>);

impl ModelCosts {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, cost)| *cost)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, cost)| cost).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ModelCosts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, cost) in &self.0 {
            map.serialize_entry(key, cost)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCost {
    pub date: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostProjection {
    pub predicted_monthly_cost: f64,
    pub confidence: Confidence,
    pub daily_average: f64,
    pub trend: CostTrend,
    pub based_on_days: u32,
}

impl Default for CostProjection {
    fn default() -> Self {
        Self {
            predicted_monthly_cost: 0.0,
            confidence: Confidence::Low,
            daily_average: 0.0,
            trend: CostTrend::Stable,
            based_on_days: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostStats {
    pub period_days: u32,
    pub total_calls: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
    pub avg_latency_ms: f64,
    pub failed_calls: u64,
    pub success_rate: f64,
}

// =====================================================================================
// PERFORMANCE
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub timestamp: NaiveDateTime,
    pub system: SystemFigures,
    pub gateway: GatewayFigures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemFigures {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub cpu_1h_avg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GatewayFigures {
    pub response_1h_avg: f64,
    pub total_requests: u64,
}

// =====================================================================================
// ANOMALIES
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Other,
}

impl Severity {
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Other,
        }
    }
}

/// The three known buckets are always serialised; `other` only appears once a
/// severity outside the known levels has been seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: u64,
    pub error: u64,
    pub warning: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub other: u64,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity, count: u64) {
        let bucket = match severity {
            Severity::Critical => &mut self.critical,
            Severity::Error => &mut self.error,
            Severity::Warning => &mut self.warning,
            Severity::Other => &mut self.other,
        };
        *bucket += count;
    }

    pub fn total(&self) -> u64 {
        self.critical + self.error + self.warning + self.other
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalySnapshot {
    pub timestamp: NaiveDateTime,
    pub total_anomalies: u64,
    pub by_severity: SeverityCounts,
    pub by_type: BTreeMap<String, u64>,
    pub recent_anomalies: Vec<AnomalyEvent>,
}

// =====================================================================================
// CHANNELS
// =====================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChannelStatus {
    Active,
    Idle,
    Disconnected,
    #[default]
    Unknown,
}

impl ChannelStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => ChannelStatus::Active,
            "idle" => ChannelStatus::Idle,
            "disconnected" => ChannelStatus::Disconnected,
            _ => ChannelStatus::Unknown,
        }
    }
}

impl From<String> for ChannelStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Unrecognised classes are treated as secondary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChannelClass {
    Primary,
    #[default]
    Secondary,
    Backup,
}

impl ChannelClass {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" => ChannelClass::Primary,
            "backup" => ChannelClass::Backup,
            _ => ChannelClass::Secondary,
        }
    }
}

impl From<String> for ChannelClass {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ChannelStatus,
    #[serde(default)]
    pub received: u64,
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(rename = "type", default)]
    pub class: ChannelClass,
}

pub type ChannelMap = BTreeMap<String, ChannelState>;

/// Either the per-channel states or an error marker. Callers treat a present `error`
/// field as "channel data unavailable"; it never fails the surrounding snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelReport {
    Channels(ChannelMap),
    Unavailable {
        error: String,
        timestamp: NaiveDateTime,
    },
}

impl ChannelReport {
    pub fn channels(&self) -> Option<&ChannelMap> {
        match self {
            ChannelReport::Channels(channels) => Some(channels),
            ChannelReport::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.channels().is_some()
    }
}

// =====================================================================================
// FACADE CONTRACT
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringSnapshot {
    pub gateway: ProbeResult,
    pub costs: CostSnapshot,
    pub performance: PerformanceSnapshot,
    pub logs: AnomalySnapshot,
    pub channels: ChannelReport,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub disk_usage_percent: f64,
    pub logs_human: String,
    pub workspace_human: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub channels_total: usize,
    pub channels_active: usize,
    pub healthy: bool,
}

/// Body of `/api/full-status`: the snapshot plus blocks derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullStatus {
    #[serde(flatten)]
    pub snapshot: MonitoringSnapshot,
    pub resources: ResourceUsage,
    pub summary: SnapshotSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: NaiveDateTime,
}

// =====================================================================================
// ERRORS
// =====================================================================================

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("Storage query failed: {0}")]
    Store(#[from] StoreError),
    #[error("Storage query timed out after {0:?}")]
    QueryTimeout(Duration),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error("Channel probe failed: {0}")]
    ChannelProbe(String),
    #[error("Channel probe not configured")]
    ChannelProbeNotConfigured,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
}
