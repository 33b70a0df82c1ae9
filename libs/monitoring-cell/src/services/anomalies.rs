// =====================================================================================
// ANOMALY AGGREGATION SERVICE
// =====================================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{instrument, warn};

use crate::models::{AnomalySnapshot, Severity, SeverityCounts};
use crate::services::query::run_query;
use shared_database::{AnomalyEvent, AnomalyGrouping, EventStore, TimeRange};

pub const RECENT_ANOMALY_LIMIT: usize = 10;
const RECENT_ANOMALY_DAYS: i64 = 7;
const UNKNOWN_TYPE: &str = "unknown";

pub struct AnomalyAggregator {
    store: Arc<dyn EventStore>,
    query_timeout: Duration,
}

struct AnomalyRows {
    by_severity: Vec<(String, u64)>,
    by_type: Vec<(String, u64)>,
    recent: Vec<AnomalyEvent>,
}

impl AnomalyAggregator {
    pub fn new(store: Arc<dyn EventStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn aggregate(&self, now: NaiveDateTime) -> AnomalySnapshot {
        let recent_window = TimeRange::since(now - TimeDelta::days(RECENT_ANOMALY_DAYS));

        let rows = run_query(&self.store, self.query_timeout, move |store| {
            Ok(AnomalyRows {
                by_severity: store.anomaly_counts(AnomalyGrouping::Severity)?,
                by_type: store.anomaly_counts(AnomalyGrouping::Type)?,
                recent: store.recent_anomalies(&recent_window, RECENT_ANOMALY_LIMIT)?,
            })
        })
        .await;

        match rows {
            Ok(rows) => build_snapshot(now, rows),
            Err(e) => {
                warn!("Anomaly data unavailable, returning empty snapshot: {}", e);
                AnomalySnapshot {
                    timestamp: now,
                    total_anomalies: 0,
                    by_severity: SeverityCounts::default(),
                    by_type: BTreeMap::new(),
                    recent_anomalies: Vec::new(),
                }
            }
        }
    }
}

fn build_snapshot(now: NaiveDateTime, rows: AnomalyRows) -> AnomalySnapshot {
    let by_severity = bucket_severities(&rows.by_severity);
    let by_type = group_types(&rows.by_type);

    AnomalySnapshot {
        timestamp: now,
        total_anomalies: by_severity.total(),
        by_severity,
        by_type,
        recent_anomalies: rows.recent,
    }
}

/// Every severity lands in exactly one bucket, so the bucket total is the all-time
/// anomaly count.
pub fn bucket_severities(counts: &[(String, u64)]) -> SeverityCounts {
    let mut buckets = SeverityCounts::default();
    for (severity, count) in counts {
        buckets.record(Severity::classify(severity), *count);
    }
    buckets
}

pub fn group_types(counts: &[(String, u64)]) -> BTreeMap<String, u64> {
    let mut grouped = BTreeMap::new();
    for (anomaly_type, count) in counts {
        let key = if anomaly_type.trim().is_empty() {
            UNKNOWN_TYPE.to_string()
        } else {
            anomaly_type.clone()
        };
        *grouped.entry(key).or_insert(0) += count;
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_known_buckets_present_without_data() {
        let buckets = bucket_severities(&[]);

        assert_eq!(buckets, SeverityCounts::default());
        let json = serde_json::to_value(&buckets).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(json["critical"], 0);
        assert_eq!(json["error"], 0);
        assert_eq!(json["warning"], 0);
    }

    #[test]
    fn test_unknown_severities_go_to_other() {
        let buckets = bucket_severities(&counts(&[
            ("critical", 2),
            ("WARNING", 3),
            ("fatal", 1),
            ("", 4),
        ]));

        assert_eq!(buckets.critical, 2);
        assert_eq!(buckets.warning, 3);
        assert_eq!(buckets.other, 5);
        assert_eq!(buckets.total(), 10);
    }

    #[test]
    fn test_blank_types_are_grouped_as_unknown() {
        let grouped = group_types(&counts(&[("timeout", 3), ("", 1), ("  ", 2)]));

        assert_eq!(grouped.get("timeout"), Some(&3));
        assert_eq!(grouped.get("unknown"), Some(&3));
        assert_eq!(grouped.len(), 2);
    }
}
