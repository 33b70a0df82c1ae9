//! Table layout of the telemetry datasets.
//!
//! The ingestion collaborator owns these tables; the monitoring engine only reads
//! them. These helpers exist so tests and local tooling can create fixture databases
//! with the same layout.

use rusqlite::Connection;

use crate::error::StoreResult;

/// Creates `model_calls` (cost_tracker.db).
pub fn initialize_costs_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS model_calls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            model TEXT,
            provider TEXT,
            cost_usd REAL,
            input_tokens INTEGER,
            output_tokens INTEGER,
            latency_ms REAL,
            success INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_model_calls_timestamp ON model_calls(timestamp);",
    )?;
    Ok(())
}

/// Creates `metrics` and `gateway_metrics` (system_metrics.db).
pub fn initialize_metrics_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            cpu_percent REAL,
            memory_percent REAL,
            disk_percent REAL
        );
        CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp);

        CREATE TABLE IF NOT EXISTS gateway_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            response_time_ms REAL
        );
        CREATE INDEX IF NOT EXISTS idx_gateway_metrics_timestamp ON gateway_metrics(timestamp);",
    )?;
    Ok(())
}

/// Creates `anomaly_events` (log_patterns.db).
pub fn initialize_anomalies_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS anomaly_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            anomaly_type TEXT,
            severity TEXT,
            description TEXT,
            suggested_action TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_anomaly_events_timestamp ON anomaly_events(timestamp);",
    )?;
    Ok(())
}
