// =====================================================================================
// PERFORMANCE AGGREGATION SERVICE
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{instrument, warn};

use crate::models::{GatewayFigures, PerformanceSnapshot, SystemFigures};
use crate::services::query::run_query;
use shared_database::{EventStore, GatewayMetric, MetricSnapshot, TimeRange};
use shared_utils::format::round2;

const ROLLING_WINDOW_HOURS: i64 = 1;

pub struct PerformanceAggregator {
    store: Arc<dyn EventStore>,
    query_timeout: Duration,
}

impl PerformanceAggregator {
    pub fn new(store: Arc<dyn EventStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// System and gateway figures are read independently; either half falls back to
    /// zeros on its own.
    #[instrument(skip(self))]
    pub async fn aggregate(&self, now: NaiveDateTime) -> PerformanceSnapshot {
        let window = TimeRange::between(now - TimeDelta::hours(ROLLING_WINDOW_HOURS), now);

        let (system, gateway) = tokio::join!(self.system(window), self.gateway(window));

        PerformanceSnapshot {
            timestamp: now,
            system,
            gateway,
        }
    }

    async fn system(&self, window: TimeRange) -> SystemFigures {
        let rows = run_query(&self.store, self.query_timeout, move |store| {
            let latest = store.latest_metric_snapshot()?;
            let recent = store.metric_snapshots(&window)?;
            Ok((latest, recent))
        })
        .await;

        match rows {
            Ok((latest, recent)) => system_figures(latest.as_ref(), &recent),
            Err(e) => {
                warn!("System metrics unavailable, returning zeros: {}", e);
                SystemFigures::default()
            }
        }
    }

    async fn gateway(&self, window: TimeRange) -> GatewayFigures {
        let rows = run_query(&self.store, self.query_timeout, move |store| {
            store.gateway_metrics(&window)
        })
        .await;

        match rows {
            Ok(rows) => gateway_figures(&rows),
            Err(e) => {
                warn!("Gateway metrics unavailable, returning zeros: {}", e);
                GatewayFigures::default()
            }
        }
    }
}

pub fn system_figures(latest: Option<&MetricSnapshot>, recent: &[MetricSnapshot]) -> SystemFigures {
    let cpu_1h_avg = mean(recent.iter().map(|s| s.cpu_percent));

    match latest {
        Some(latest) => SystemFigures {
            cpu_percent: latest.cpu_percent,
            memory_percent: latest.memory_percent,
            disk_percent: latest.disk_percent,
            cpu_1h_avg,
        },
        None => SystemFigures {
            cpu_1h_avg,
            ..SystemFigures::default()
        },
    }
}

pub fn gateway_figures(rows: &[GatewayMetric]) -> GatewayFigures {
    GatewayFigures {
        response_1h_avg: mean(rows.iter().map(|r| r.response_time_ms)),
        total_requests: rows.len() as u64,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round2(sum / f64::from(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 18)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn snapshot(timestamp: NaiveDateTime, cpu: f64) -> MetricSnapshot {
        MetricSnapshot {
            timestamp,
            cpu_percent: cpu,
            memory_percent: 40.0,
            disk_percent: 71.5,
        }
    }

    #[test]
    fn test_system_figures_use_latest_and_window_average() {
        let recent = vec![snapshot(at(13, 10), 10.0), snapshot(at(13, 40), 25.0)];
        let figures = system_figures(recent.last(), &recent);

        assert_eq!(figures.cpu_percent, 25.0);
        assert_eq!(figures.disk_percent, 71.5);
        assert_eq!(figures.cpu_1h_avg, 17.5);
    }

    #[test]
    fn test_stale_latest_snapshot_still_reported() {
        let stale = snapshot(at(9, 0), 80.0);
        let figures = system_figures(Some(&stale), &[]);

        assert_eq!(figures.cpu_percent, 80.0);
        assert_eq!(figures.cpu_1h_avg, 0.0);
    }

    #[test]
    fn test_gateway_figures() {
        let rows = vec![
            GatewayMetric {
                timestamp: at(13, 5),
                response_time_ms: 120.0,
            },
            GatewayMetric {
                timestamp: at(13, 6),
                response_time_ms: 95.5,
            },
        ];

        let figures = gateway_figures(&rows);
        assert_eq!(figures.total_requests, 2);
        assert_eq!(figures.response_1h_avg, 107.75);
        assert_eq!(gateway_figures(&[]), GatewayFigures::default());
    }
}
