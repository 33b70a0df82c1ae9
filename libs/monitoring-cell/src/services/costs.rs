// =====================================================================================
// COST AGGREGATION SERVICE
// =====================================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{instrument, warn};

use crate::models::{
    Confidence, CostProjection, CostSnapshot, CostStats, CostTrend, DailyCost, ModelCosts,
};
use crate::services::query::run_query;
use shared_database::{CostEvent, EventStore, TimeRange};
use shared_utils::format::round2;

const STATS_PERIOD_DAYS: u32 = 30;
const BY_MODEL_DAYS: i64 = 7;
const TREND_DAYS: i64 = 7;
const PROJECTION_MONTH_DAYS: f64 = 30.0;
const MEDIUM_CONFIDENCE_AFTER_DAY: u32 = 10;

pub struct CostAggregator {
    store: Arc<dyn EventStore>,
    query_timeout: Duration,
}

impl CostAggregator {
    pub fn new(store: Arc<dyn EventStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// Reads every cost event needed for the widest window once, then folds all
    /// rollups in memory. A failed read yields the zeroed snapshot.
    #[instrument(skip(self))]
    pub async fn aggregate(&self, now: NaiveDateTime) -> CostSnapshot {
        let windows = CostWindows::at(now);
        let range = TimeRange::since(windows.earliest());

        match run_query(&self.store, self.query_timeout, move |store| {
            store.cost_events(&range)
        })
        .await
        {
            Ok(events) => summarize(&events, now),
            Err(e) => {
                warn!("Cost data unavailable, returning zeroed snapshot: {}", e);
                summarize(&[], now)
            }
        }
    }
}

/// Window starts for a fixed `now`. Daily, weekly and monthly are calendar aligned;
/// the by-model and stats windows trail `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostWindows {
    pub day_start: NaiveDateTime,
    pub week_start: NaiveDateTime,
    pub month_start: NaiveDateTime,
    pub by_model_start: NaiveDateTime,
    pub stats_start: NaiveDateTime,
    pub trend_start: NaiveDateTime,
}

impl CostWindows {
    pub fn at(now: NaiveDateTime) -> Self {
        let today = now.date();
        let midnight = |days_back: i64| {
            (today - TimeDelta::days(days_back)).and_time(NaiveTime::MIN)
        };

        Self {
            day_start: midnight(0),
            week_start: midnight(i64::from(now.weekday().num_days_from_monday())),
            month_start: midnight(i64::from(now.day0())),
            by_model_start: now - TimeDelta::days(BY_MODEL_DAYS),
            stats_start: now - TimeDelta::days(i64::from(STATS_PERIOD_DAYS)),
            trend_start: midnight(TREND_DAYS - 1),
        }
    }

    pub fn earliest(&self) -> NaiveDateTime {
        [
            self.day_start,
            self.week_start,
            self.month_start,
            self.by_model_start,
            self.stats_start,
            self.trend_start,
        ]
        .into_iter()
        .min()
        .unwrap_or(self.day_start)
    }
}

/// Folds cost events into a snapshot. Events older than every window are ignored, so
/// callers may pass a superset.
pub fn summarize(events: &[CostEvent], now: NaiveDateTime) -> CostSnapshot {
    let windows = CostWindows::at(now);

    let sum_since = |start: NaiveDateTime| -> f64 {
        events
            .iter()
            .filter(|e| e.timestamp >= start)
            .map(|e| e.cost_usd)
            .sum()
    };

    let daily = round2(sum_since(windows.day_start));
    let weekly = round2(sum_since(windows.week_start));
    let monthly = round2(sum_since(windows.month_start));

    CostSnapshot {
        timestamp: now,
        daily,
        weekly,
        monthly,
        by_model: by_model(events, windows.by_model_start),
        trend_7d: trend(events, windows.trend_start),
        projection: project(monthly, daily, now.day()),
        stats: stats(events, windows.stats_start),
    }
}

fn by_model(events: &[CostEvent], since: NaiveDateTime) -> ModelCosts {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for event in events.iter().filter(|e| e.timestamp >= since) {
        *totals
            .entry(format!("{}/{}", event.provider, event.model))
            .or_insert(0.0) += event.cost_usd;
    }

    let mut ranked: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(key, cost)| (key, round2(cost)))
        .collect();
    // Stable sort keeps equal costs in key order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ModelCosts(ranked)
}

fn trend(events: &[CostEvent], first_day: NaiveDateTime) -> Vec<DailyCost> {
    (0..TREND_DAYS)
        .map(|offset| {
            let start = first_day + TimeDelta::days(offset);
            let end = start + TimeDelta::days(1);
            let cost = events
                .iter()
                .filter(|e| e.timestamp >= start && e.timestamp < end)
                .map(|e| e.cost_usd)
                .sum();
            DailyCost {
                date: start.format("%m-%d").to_string(),
                cost: round2(cost),
            }
        })
        .collect()
}

fn stats(events: &[CostEvent], since: NaiveDateTime) -> CostStats {
    let window: Vec<&CostEvent> = events.iter().filter(|e| e.timestamp >= since).collect();
    if window.is_empty() {
        return CostStats {
            period_days: STATS_PERIOD_DAYS,
            ..CostStats::default()
        };
    }

    let total_calls = window.len() as u64;
    let failed_calls = window.iter().filter(|e| !e.success).count() as u64;
    let total_latency: f64 = window.iter().map(|e| e.latency_ms).sum();

    CostStats {
        period_days: STATS_PERIOD_DAYS,
        total_calls,
        total_input_tokens: window.iter().map(|e| e.input_tokens).sum(),
        total_output_tokens: window.iter().map(|e| e.output_tokens).sum(),
        total_cost_usd: round2(window.iter().map(|e| e.cost_usd).sum()),
        avg_latency_ms: round2(total_latency / total_calls as f64),
        failed_calls,
        success_rate: round2((total_calls - failed_calls) as f64 * 100.0 / total_calls as f64),
    }
}

/// Extrapolates the month-to-date spend over a 30 day month.
pub fn project(monthly: f64, daily: f64, day_of_month: u32) -> CostProjection {
    if monthly <= 0.0 {
        return CostProjection::default();
    }

    let days = day_of_month.max(1);
    let daily_average = monthly / f64::from(days);

    CostProjection {
        predicted_monthly_cost: round2(daily_average * PROJECTION_MONTH_DAYS),
        confidence: if days > MEDIUM_CONFIDENCE_AFTER_DAY {
            Confidence::Medium
        } else {
            Confidence::Low
        },
        daily_average: round2(daily_average),
        trend: if daily_average > daily.max(1.0) {
            CostTrend::Increasing
        } else {
            CostTrend::Stable
        },
        based_on_days: days,
    }
}
