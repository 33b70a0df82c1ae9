use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use rusqlite::{params, Connection, OpenFlags, Row};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::error::{StoreError, StoreResult};
use crate::models::{AnomalyEvent, AnomalyGrouping, CostEvent, GatewayMetric, MetricSnapshot, TimeRange};
use crate::store::EventStore;

/// File locations of the three datasets. Each one may be absent independently.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub costs: PathBuf,
    pub metrics: PathBuf,
    pub anomalies: PathBuf,
}

impl StorePaths {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            costs: config.costs_db_path(),
            metrics: config.metrics_db_path(),
            anomalies: config.anomalies_db_path(),
        }
    }
}

/// EventStore over the SQLite files written by the ingestion collaborator.
///
/// A fresh read-only connection is opened for every call, so the store itself holds
/// no connection state and is safe to share between threads.
pub struct SqliteEventStore {
    paths: StorePaths,
    busy_timeout: Duration,
}

impl SqliteEventStore {
    pub fn new(paths: StorePaths, busy_timeout: Duration) -> Self {
        Self { paths, busy_timeout }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(StorePaths::from_config(config), config.store_query_timeout)
    }

    fn open(&self, path: &Path) -> StoreResult<Connection> {
        if !path.exists() {
            debug!("Dataset {} does not exist", path.display());
            return Err(StoreError::Unavailable(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl EventStore for SqliteEventStore {
    fn cost_events(&self, range: &TimeRange) -> StoreResult<Vec<CostEvent>> {
        let conn = self.open(&self.paths.costs)?;
        let (start, end) = range_params(range);

        let mut stmt = conn.prepare(
            "SELECT timestamp, model, provider, cost_usd, input_tokens, output_tokens, latency_ms, success
             FROM model_calls
             WHERE replace(timestamp, ' ', 'T') >= ?1 AND (?2 IS NULL OR replace(timestamp, ' ', 'T') <= ?2)
             ORDER BY replace(timestamp, ' ', 'T') ASC",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            with_timestamp(row, |timestamp| {
                Ok(CostEvent {
                    timestamp,
                    model: text_or(row, 1, "unknown")?,
                    provider: text_or(row, 2, "unknown")?,
                    cost_usd: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    input_tokens: count(row, 4)?,
                    output_tokens: count(row, 5)?,
                    latency_ms: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                    success: row.get::<_, Option<bool>>(7)?.unwrap_or(true),
                })
            })
        })?;

        collect_rows(rows, "model_calls", usize::MAX, |event: &CostEvent| {
            range.contains(event.timestamp)
        })
    }

    fn latest_metric_snapshot(&self) -> StoreResult<Option<MetricSnapshot>> {
        let conn = self.open(&self.paths.metrics)?;

        let mut stmt = conn.prepare(
            "SELECT timestamp, cpu_percent, memory_percent, disk_percent
             FROM metrics
             ORDER BY replace(timestamp, ' ', 'T') DESC",
        )?;
        let rows = stmt.query_map([], metric_row)?;

        // Rows are read lazily, so this stops at the newest parseable one.
        let latest = collect_rows(rows, "metrics", 1, |_| true)?.pop();
        Ok(latest)
    }

    fn metric_snapshots(&self, range: &TimeRange) -> StoreResult<Vec<MetricSnapshot>> {
        let conn = self.open(&self.paths.metrics)?;
        let (start, end) = range_params(range);

        let mut stmt = conn.prepare(
            "SELECT timestamp, cpu_percent, memory_percent, disk_percent
             FROM metrics
             WHERE replace(timestamp, ' ', 'T') >= ?1 AND (?2 IS NULL OR replace(timestamp, ' ', 'T') <= ?2)
             ORDER BY replace(timestamp, ' ', 'T') ASC",
        )?;
        let rows = stmt.query_map(params![start, end], metric_row)?;

        collect_rows(rows, "metrics", usize::MAX, |snapshot: &MetricSnapshot| {
            range.contains(snapshot.timestamp)
        })
    }

    fn gateway_metrics(&self, range: &TimeRange) -> StoreResult<Vec<GatewayMetric>> {
        let conn = self.open(&self.paths.metrics)?;
        let (start, end) = range_params(range);

        let mut stmt = conn.prepare(
            "SELECT timestamp, response_time_ms
             FROM gateway_metrics
             WHERE replace(timestamp, ' ', 'T') >= ?1 AND (?2 IS NULL OR replace(timestamp, ' ', 'T') <= ?2)
             ORDER BY replace(timestamp, ' ', 'T') ASC",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            with_timestamp(row, |timestamp| {
                Ok(GatewayMetric {
                    timestamp,
                    response_time_ms: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                })
            })
        })?;

        collect_rows(rows, "gateway_metrics", usize::MAX, |metric: &GatewayMetric| {
            range.contains(metric.timestamp)
        })
    }

    fn anomaly_counts(&self, grouping: AnomalyGrouping) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.open(&self.paths.anomalies)?;
        let column = match grouping {
            AnomalyGrouping::Severity => "severity",
            AnomalyGrouping::Type => "anomaly_type",
        };

        let sql = format!(
            "SELECT COALESCE({column}, ''), COUNT(*) FROM anomaly_events GROUP BY 1 ORDER BY 1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, count(row, 1)?)))?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn recent_anomalies(&self, range: &TimeRange, limit: usize) -> StoreResult<Vec<AnomalyEvent>> {
        let conn = self.open(&self.paths.anomalies)?;
        let (start, end) = range_params(range);

        let mut stmt = conn.prepare(
            "SELECT timestamp, anomaly_type, severity, description, suggested_action
             FROM anomaly_events
             WHERE replace(timestamp, ' ', 'T') >= ?1 AND (?2 IS NULL OR replace(timestamp, ' ', 'T') <= ?2)
             ORDER BY replace(timestamp, ' ', 'T') DESC",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            with_timestamp(row, |timestamp| {
                Ok(AnomalyEvent {
                    timestamp,
                    anomaly_type: text_or(row, 1, "unknown")?,
                    severity: text_or(row, 2, "")?,
                    description: text_or(row, 3, "")?,
                    suggested_action: text_or(row, 4, "")?,
                })
            })
        })?;

        collect_rows(rows, "anomaly_events", limit, |anomaly: &AnomalyEvent| {
            range.contains(anomaly.timestamp)
        })
    }
}

/// Parses the ISO-8601 text timestamps the ingestion side writes. Both `T` and space
/// separators are accepted, with or without fractional seconds; an explicit offset is
/// dropped in favour of the wall-clock reading.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}

// Stored timestamps compare as text, with a space separator normalised to `T`. The
// start bound drops the fraction so it never excludes a row in the same second; the
// end bound keeps six digits so a row without a fraction still sorts below it. Rows
// are re-checked against the exact range after parsing.
fn range_params(range: &TimeRange) -> (String, Option<String>) {
    (
        range.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        range
            .end
            .map(|end| end.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    )
}

type Parsed<T> = Result<T, String>;

fn with_timestamp<T, F>(row: &Row<'_>, build: F) -> rusqlite::Result<Parsed<T>>
where
    F: FnOnce(NaiveDateTime) -> rusqlite::Result<T>,
{
    let raw: Option<String> = row.get(0)?;
    match raw.as_deref().and_then(parse_timestamp) {
        Some(timestamp) => build(timestamp).map(Ok),
        None => Ok(Err(raw.unwrap_or_default())),
    }
}

fn metric_row(row: &Row<'_>) -> rusqlite::Result<Parsed<MetricSnapshot>> {
    with_timestamp(row, |timestamp| {
        Ok(MetricSnapshot {
            timestamp,
            cpu_percent: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
            memory_percent: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            disk_percent: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        })
    })
}

/// Gathers up to `limit` parsed rows that satisfy `keep`. Unparseable rows are skipped
/// and do not count towards the limit, so the cap is applied here rather than in SQL.
fn collect_rows<T, I, P>(rows: I, table: &str, limit: usize, keep: P) -> StoreResult<Vec<T>>
where
    I: Iterator<Item = rusqlite::Result<Parsed<T>>>,
    P: Fn(&T) -> bool,
{
    let mut items = Vec::new();
    for row in rows {
        if items.len() >= limit {
            break;
        }
        match row? {
            Ok(item) if keep(&item) => items.push(item),
            Ok(_) => {}
            Err(raw) => warn!(table, timestamp = %raw, "Skipping row with unparseable timestamp"),
        }
    }
    Ok(items)
}

fn text_or(row: &Row<'_>, index: usize, default: &str) -> rusqlite::Result<String> {
    Ok(row
        .get::<_, Option<String>>(index)?
        .unwrap_or_else(|| default.to_string()))
}

fn count(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let value = row.get::<_, Option<i64>>(index)?.unwrap_or(0);
    Ok(u64::try_from(value).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn store_in(dir: &TempDir) -> SqliteEventStore {
        SqliteEventStore::new(
            StorePaths {
                costs: dir.path().join("cost_tracker.db"),
                metrics: dir.path().join("system_metrics.db"),
                anomalies: dir.path().join("log_patterns.db"),
            },
            Duration::from_millis(500),
        )
    }

    fn seed_costs(dir: &TempDir, rows: &[(&str, &str, &str, f64)]) {
        let conn = Connection::open(dir.path().join("cost_tracker.db")).unwrap();
        schema::initialize_costs_schema(&conn).unwrap();
        for (timestamp, model, provider, cost) in rows {
            conn.execute(
                "INSERT INTO model_calls (timestamp, model, provider, cost_usd, input_tokens, output_tokens, latency_ms, success)
                 VALUES (?1, ?2, ?3, ?4, 100, 50, 250.0, 1)",
                params![timestamp, model, provider, cost],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = ts(15, 9, 30);

        assert_eq!(parse_timestamp("2026-03-15T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-15 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-15T09:30:00+08:00"), Some(expected));
        assert!(parse_timestamp("2026-03-15T09:30:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_missing_dataset_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let result = store.cost_events(&TimeRange::since(ts(1, 0, 0)));
        assert_matches!(result, Err(StoreError::Unavailable(_)));
    }

    #[test]
    fn test_missing_table_is_database_error() {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("system_metrics.db")).unwrap();
        conn.execute_batch("CREATE TABLE unrelated (id INTEGER)").unwrap();
        let store = store_in(&dir);

        let result = store.latest_metric_snapshot();
        assert_matches!(result, Err(StoreError::Database(_)));
    }

    #[test]
    fn test_cost_events_respect_range_and_fractional_seconds() {
        let dir = TempDir::new().unwrap();
        seed_costs(
            &dir,
            &[
                ("2026-03-14T23:59:59.999000", "gpt-4o", "openai", 1.0),
                ("2026-03-15T00:00:00", "gpt-4o", "openai", 2.0),
                ("2026-03-15T12:00:00.250000", "claude-sonnet", "anthropic", 3.0),
                ("2026-03-16T00:00:00", "claude-sonnet", "anthropic", 4.0),
            ],
        );
        let store = store_in(&dir);

        let events = store
            .cost_events(&TimeRange::between(ts(15, 0, 0), ts(15, 23, 59)))
            .unwrap();

        let costs: Vec<f64> = events.iter().map(|e| e.cost_usd).collect();
        assert_eq!(costs, vec![2.0, 3.0]);
        assert_eq!(events[1].provider, "anthropic");
        assert_eq!(events[1].input_tokens, 100);
        assert!(events[1].success);
    }

    #[test]
    fn test_unparseable_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        seed_costs(
            &dir,
            &[
                ("2026-03-15T08:00:00", "gpt-4o", "openai", 1.5),
                ("2026-03-15Tgarbage", "gpt-4o", "openai", 9.0),
            ],
        );
        let store = store_in(&dir);

        let events = store.cost_events(&TimeRange::since(ts(1, 0, 0))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cost_usd, 1.5);
    }

    #[test]
    fn test_null_columns_default() {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("cost_tracker.db")).unwrap();
        schema::initialize_costs_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO model_calls (timestamp, cost_usd) VALUES ('2026-03-15T08:00:00', NULL)",
            [],
        )
        .unwrap();
        let store = store_in(&dir);

        let events = store.cost_events(&TimeRange::since(ts(1, 0, 0))).unwrap();
        assert_eq!(events[0].model, "unknown");
        assert_eq!(events[0].cost_usd, 0.0);
        assert_eq!(events[0].output_tokens, 0);
    }

    #[test]
    fn test_latest_metric_snapshot_and_gateway_metrics() {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("system_metrics.db")).unwrap();
        schema::initialize_metrics_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO metrics (timestamp, cpu_percent, memory_percent, disk_percent) VALUES
                ('2026-03-15T08:00:00', 10.0, 40.0, 70.0),
                ('2026-03-15T09:00:00', 30.0, 45.0, 71.0);
             INSERT INTO gateway_metrics (timestamp, response_time_ms) VALUES
                ('2026-03-15T08:30:00', 120.0),
                ('2026-03-15T08:45:00', 180.0);",
        )
        .unwrap();
        let store = store_in(&dir);

        let latest = store.latest_metric_snapshot().unwrap().unwrap();
        assert_eq!(latest.timestamp, ts(15, 9, 0));
        assert_eq!(latest.cpu_percent, 30.0);

        let gateway = store
            .gateway_metrics(&TimeRange::between(ts(15, 8, 40), ts(15, 9, 0)))
            .unwrap();
        assert_eq!(gateway.len(), 1);
        assert_eq!(gateway[0].response_time_ms, 180.0);
    }

    #[test]
    fn test_anomaly_counts_and_recent_order() {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("log_patterns.db")).unwrap();
        schema::initialize_anomalies_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO anomaly_events (timestamp, anomaly_type, severity, description, suggested_action) VALUES
                ('2026-03-10T08:00:00', 'timeout', 'error', 'old', 'retry'),
                ('2026-03-15T08:00:00', 'timeout', 'warning', 'slow upstream', 'check network'),
                ('2026-03-15T09:00:00', 'oom', 'critical', 'worker killed', 'raise limits'),
                ('2026-03-15T10:00:00', 'oom', NULL, 'no severity', '');",
        )
        .unwrap();
        let store = store_in(&dir);

        let by_type = store.anomaly_counts(AnomalyGrouping::Type).unwrap();
        assert_eq!(by_type, vec![("oom".to_string(), 2), ("timeout".to_string(), 2)]);

        let by_severity = store.anomaly_counts(AnomalyGrouping::Severity).unwrap();
        assert!(by_severity.contains(&(String::new(), 1)));

        let recent = store
            .recent_anomalies(&TimeRange::since(ts(14, 0, 0)), 2)
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, ts(15, 10, 0));
        assert_eq!(recent[1].anomaly_type, "oom");
    }

    fn metrics_db(dir: &TempDir, rows: &str) {
        let conn = Connection::open(dir.path().join("system_metrics.db")).unwrap();
        schema::initialize_metrics_schema(&conn).unwrap();
        conn.execute_batch(&format!(
            "INSERT INTO metrics (timestamp, cpu_percent, memory_percent, disk_percent) VALUES {rows};"
        ))
        .unwrap();
    }

    fn anomalies_db(dir: &TempDir, rows: &str) {
        let conn = Connection::open(dir.path().join("log_patterns.db")).unwrap();
        schema::initialize_anomalies_schema(&conn).unwrap();
        conn.execute_batch(&format!(
            "INSERT INTO anomaly_events (timestamp, anomaly_type, severity, description, suggested_action) VALUES {rows};"
        ))
        .unwrap();
    }

    #[test]
    fn test_latest_snapshot_orders_mixed_separators_chronologically() {
        let dir = TempDir::new().unwrap();
        metrics_db(
            &dir,
            "('2026-03-15T08:00:00', 10.0, 40.0, 70.0), ('2026-03-15 09:00:00', 30.0, 45.0, 71.0)",
        );

        let latest = store_in(&dir).latest_metric_snapshot().unwrap().unwrap();
        assert_eq!(latest.timestamp, ts(15, 9, 0));
        assert_eq!(latest.cpu_percent, 30.0);
    }

    #[test]
    fn test_recent_anomalies_order_mixed_separators_chronologically() {
        let dir = TempDir::new().unwrap();
        anomalies_db(
            &dir,
            "('2026-03-15T08:00:00', 'a', 'warning', '', ''), ('2026-03-15 10:00:00', 'newest', 'error', '', '')",
        );

        let recent = store_in(&dir)
            .recent_anomalies(&TimeRange::since(ts(14, 0, 0)), 1)
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].anomaly_type, "newest");
        assert_eq!(recent[0].timestamp, ts(15, 10, 0));
    }

    #[test]
    fn test_latest_snapshot_skips_unparseable_newest_row() {
        let dir = TempDir::new().unwrap();
        metrics_db(
            &dir,
            "('2026-03-15T08:00:00', 12.0, 40.0, 70.0), ('2026-03-15Tgarbage', 99.0, 99.0, 99.0)",
        );

        let latest = store_in(&dir).latest_metric_snapshot().unwrap().unwrap();
        assert_eq!(latest.timestamp, ts(15, 8, 0));
        assert_eq!(latest.cpu_percent, 12.0);
    }

    #[test]
    fn test_recent_anomalies_limit_counts_only_parseable_rows() {
        let dir = TempDir::new().unwrap();
        anomalies_db(
            &dir,
            "('2026-03-15T08:00:00', 'older', 'warning', '', ''),
             ('2026-03-15T09:00:00', 'newer', 'error', '', ''),
             ('2026-03-15Tgarbage', 'broken', 'critical', '', '')",
        );

        let recent = store_in(&dir)
            .recent_anomalies(&TimeRange::since(ts(14, 0, 0)), 2)
            .unwrap();
        let types: Vec<&str> = recent.iter().map(|a| a.anomaly_type.as_str()).collect();
        assert_eq!(types, vec!["newer", "older"]);
    }
}
