// =====================================================================================
// MONITORING FACADE
// =====================================================================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::models::{
    AnomalySnapshot, ChannelReport, ChannelStatus, CostSnapshot, FullStatus, MonitoringSnapshot,
    PerformanceSnapshot, ProbeResult, SnapshotSummary, StatusResponse,
};
use crate::services::{
    AnomalyAggregator, ChannelAggregator, CostAggregator, GatewayProbe, PerformanceAggregator,
    ResourceInspector,
};
use shared_config::AppConfig;
use shared_database::{EventStore, SqliteEventStore};

/// Built once at startup and shared by every request. Holds no per-request state, so
/// concurrent calls never contend.
pub struct MonitoringFacade {
    gateway: GatewayProbe,
    costs: CostAggregator,
    performance: PerformanceAggregator,
    anomalies: AnomalyAggregator,
    channels: ChannelAggregator,
    resources: ResourceInspector,
    clock: Arc<dyn Clock>,
}

impl MonitoringFacade {
    pub fn new(config: &AppConfig, store: Arc<dyn EventStore>) -> Self {
        let timeout = config.store_query_timeout;

        Self {
            gateway: GatewayProbe::from_config(config),
            costs: CostAggregator::new(store.clone(), timeout),
            performance: PerformanceAggregator::new(store.clone(), timeout),
            anomalies: AnomalyAggregator::new(store, timeout),
            channels: ChannelAggregator::from_config(config),
            resources: ResourceInspector::new(
                config.log_dir.clone(),
                config.workspace_dir.clone(),
                timeout,
            ),
            clock: Arc::new(SystemClock),
        }
    }

    /// Facade over the SQLite datasets under `config.data_dir`.
    pub fn from_config(config: &AppConfig) -> Self {
        let store = SqliteEventStore::from_config(config);
        info!("Reading telemetry from {}", config.data_dir.display());
        Self::new(config, Arc::new(store))
    }

    pub fn with_channel_aggregator(mut self, channels: ChannelAggregator) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_gateway_probe(mut self, gateway: GatewayProbe) -> Self {
        self.gateway = gateway.with_clock(self.clock.clone());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.gateway = self.gateway.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            status: "ok",
            timestamp: self.now(),
        }
    }

    pub async fn gateway(&self) -> ProbeResult {
        self.gateway.check().await
    }

    pub async fn costs(&self) -> CostSnapshot {
        self.costs.aggregate(self.now()).await
    }

    pub async fn performance(&self) -> PerformanceSnapshot {
        self.performance.aggregate(self.now()).await
    }

    pub async fn logs(&self) -> AnomalySnapshot {
        self.anomalies.aggregate(self.now()).await
    }

    pub async fn channels(&self) -> ChannelReport {
        self.channels.aggregate(self.now()).await
    }

    /// Runs every section concurrently against one `now`. Each section degrades on its
    /// own, so this never fails.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> MonitoringSnapshot {
        let now = self.now();

        let (gateway, costs, performance, logs, channels) = tokio::join!(
            self.gateway.check(),
            self.costs.aggregate(now),
            self.performance.aggregate(now),
            self.anomalies.aggregate(now),
            self.channels.aggregate(now),
        );

        MonitoringSnapshot {
            gateway,
            costs,
            performance,
            logs,
            channels,
            timestamp: now,
        }
    }

    pub async fn full_status(&self) -> FullStatus {
        let snapshot = self.snapshot().await;
        let resources = self.resources.usage(&snapshot.performance).await;
        let summary = summarize(&snapshot);

        FullStatus {
            snapshot,
            resources,
            summary,
        }
    }
}

pub fn summarize(snapshot: &MonitoringSnapshot) -> SnapshotSummary {
    let (channels_total, channels_active) = match snapshot.channels.channels() {
        Some(channels) => (
            channels.len(),
            channels
                .values()
                .filter(|c| c.status == ChannelStatus::Active)
                .count(),
        ),
        None => (0, 0),
    };

    SnapshotSummary {
        channels_total,
        channels_active,
        healthy: snapshot.gateway.healthy,
    }
}
