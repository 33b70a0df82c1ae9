use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde_json::json;

use shared_config::{AppConfig, ChannelRosterEntry};
use shared_database::{schema, AnomalyEvent, CostEvent, GatewayMetric, MetricSnapshot, StoreResult};

pub struct TestConfig {
    pub data_dir: PathBuf,
    pub gateway_url: String,
    pub channel_probe_url: Option<String>,
    pub channel_roster: Vec<ChannelRosterEntry>,
    pub probe_timeout: Duration,
    pub query_timeout: Duration,
}

impl TestConfig {
    /// Points every dataset at `dir`. The gateway defaults to the discard port, which
    /// refuses connections on any test host.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_dir: dir.to_path_buf(),
            gateway_url: "http://127.0.0.1:9".to_string(),
            channel_probe_url: None,
            channel_roster: Vec::new(),
            probe_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(2),
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: self.data_dir.clone(),
            workspace_dir: self.data_dir.clone(),
            log_dir: self.data_dir.join("logs"),
            gateway_url: self.gateway_url.clone(),
            gateway_probe_timeout: self.probe_timeout,
            store_query_timeout: self.query_timeout,
            channel_probe_url: self.channel_probe_url.clone(),
            channel_probe_timeout: self.probe_timeout,
            channel_roster: self.channel_roster.clone(),
        }
    }
}

pub struct TestEvents;

impl TestEvents {
    pub fn cost(timestamp: NaiveDateTime, provider: &str, model: &str, cost_usd: f64) -> CostEvent {
        CostEvent {
            timestamp,
            model: model.to_string(),
            provider: provider.to_string(),
            cost_usd,
            input_tokens: 1000,
            output_tokens: 500,
            latency_ms: 800.0,
            success: true,
        }
    }

    pub fn failed_cost(timestamp: NaiveDateTime, provider: &str, model: &str) -> CostEvent {
        CostEvent {
            success: false,
            ..Self::cost(timestamp, provider, model, 0.0)
        }
    }

    pub fn metric(timestamp: NaiveDateTime, cpu: f64, memory: f64, disk: f64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp,
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
        }
    }

    pub fn gateway(timestamp: NaiveDateTime, response_time_ms: f64) -> GatewayMetric {
        GatewayMetric {
            timestamp,
            response_time_ms,
        }
    }

    pub fn anomaly(timestamp: NaiveDateTime, anomaly_type: &str, severity: &str) -> AnomalyEvent {
        AnomalyEvent {
            timestamp,
            anomaly_type: anomaly_type.to_string(),
            severity: severity.to_string(),
            description: format!("{} detected", anomaly_type),
            suggested_action: "inspect gateway logs".to_string(),
        }
    }
}

/// Writes fixture rows into SQLite files laid out the way the ingestion collaborator
/// lays them out.
pub struct FixtureDatabases {
    dir: PathBuf,
}

impl FixtureDatabases {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn write_cost_events(&self, events: &[CostEvent]) -> StoreResult<()> {
        let conn = Connection::open(self.dir.join("cost_tracker.db"))?;
        schema::initialize_costs_schema(&conn)?;
        for event in events {
            conn.execute(
                "INSERT INTO model_calls (timestamp, model, provider, cost_usd, input_tokens, output_tokens, latency_ms, success)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    iso(event.timestamp),
                    event.model,
                    event.provider,
                    event.cost_usd,
                    event.input_tokens as i64,
                    event.output_tokens as i64,
                    event.latency_ms,
                    event.success,
                ],
            )?;
        }
        Ok(())
    }

    pub fn write_metric_snapshots(&self, snapshots: &[MetricSnapshot]) -> StoreResult<()> {
        let conn = Connection::open(self.dir.join("system_metrics.db"))?;
        schema::initialize_metrics_schema(&conn)?;
        for snapshot in snapshots {
            conn.execute(
                "INSERT INTO metrics (timestamp, cpu_percent, memory_percent, disk_percent)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    iso(snapshot.timestamp),
                    snapshot.cpu_percent,
                    snapshot.memory_percent,
                    snapshot.disk_percent,
                ],
            )?;
        }
        Ok(())
    }

    pub fn write_gateway_metrics(&self, metrics: &[GatewayMetric]) -> StoreResult<()> {
        let conn = Connection::open(self.dir.join("system_metrics.db"))?;
        schema::initialize_metrics_schema(&conn)?;
        for metric in metrics {
            conn.execute(
                "INSERT INTO gateway_metrics (timestamp, response_time_ms) VALUES (?1, ?2)",
                params![iso(metric.timestamp), metric.response_time_ms],
            )?;
        }
        Ok(())
    }

    pub fn write_anomalies(&self, anomalies: &[AnomalyEvent]) -> StoreResult<()> {
        let conn = Connection::open(self.dir.join("log_patterns.db"))?;
        schema::initialize_anomalies_schema(&conn)?;
        for anomaly in anomalies {
            conn.execute(
                "INSERT INTO anomaly_events (timestamp, anomaly_type, severity, description, suggested_action)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    iso(anomaly.timestamp),
                    anomaly.anomaly_type,
                    anomaly.severity,
                    anomaly.description,
                    anomaly.suggested_action,
                ],
            )?;
        }
        Ok(())
    }
}

fn iso(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub struct MockChannelResponses;

impl MockChannelResponses {
    pub fn all_channels() -> serde_json::Value {
        json!({
            "feishu": {
                "name": "Feishu",
                "status": "active",
                "received": 320,
                "sent": 425,
                "errors": 0,
                "type": "primary"
            },
            "telegram": {
                "name": "Telegram",
                "status": "idle",
                "received": 0,
                "sent": 0,
                "errors": 0,
                "type": "backup"
            },
            "bluebubbles": {
                "name": "BlueBubbles",
                "status": "reconnecting",
                "received": 15,
                "sent": 23,
                "errors": 2,
                "type": "secondary"
            }
        })
    }
}
