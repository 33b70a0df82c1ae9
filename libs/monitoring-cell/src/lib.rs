// =====================================================================================
// MONITORING CELL - GATEWAY TELEMETRY AGGREGATION
// =====================================================================================
//
// Read-only views over the telemetry recorded for an agent gateway deployment:
// - Gateway liveness probing
// - Cost rollups, per-model breakdown, trend and monthly projection
// - System and gateway performance figures
// - Log anomaly counts and recent anomalies
// - Per-channel connectivity state
//
// =====================================================================================

pub mod clock;
pub mod facade;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export commonly used types
pub use models::{
    AnomalySnapshot, ChannelClass, ChannelMap, ChannelReport, ChannelState, ChannelStatus,
    CostProjection, CostSnapshot, FullStatus, MonitoringError, MonitoringSnapshot,
    PerformanceSnapshot, ProbeResult,
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use facade::MonitoringFacade;
pub use services::{
    AnomalyAggregator, ChannelAggregator, ChannelProbe, CostAggregator, GatewayProbe,
    HttpChannelProbe, PerformanceAggregator,
};

pub use router::{create_monitoring_router, ENDPOINTS};
