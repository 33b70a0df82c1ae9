use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PORT: u16 = 18888;
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:18789";
const DEFAULT_LOG_DIR: &str = "/tmp/kuro-system-monitor";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub log_dir: PathBuf,
    pub gateway_url: String,
    pub gateway_probe_timeout: Duration,
    pub store_query_timeout: Duration,
    pub channel_probe_url: Option<String>,
    pub channel_probe_timeout: Duration,
    pub channel_roster: Vec<ChannelRosterEntry>,
}

/// One statically configured channel, used when no channel probe is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRosterEntry {
    pub id: String,
    pub name: String,
    pub class: String,
    pub expected: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").unwrap_or_else(|| {
            warn!("HOME not set, resolving default directories against /tmp");
            "/tmp".to_string()
        });
        let workspace_default = PathBuf::from(&home).join(".openclaw").join("workspace");

        let config = Self {
            host: lookup("MONITOR_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "MONITOR_PORT", DEFAULT_PORT),
            data_dir: lookup("MONITOR_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    warn!("MONITOR_DATA_DIR not set, using default");
                    workspace_default.join("monitoring")
                }),
            workspace_dir: lookup("MONITOR_WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| workspace_default.clone()),
            log_dir: lookup("MONITOR_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            gateway_url: lookup("GATEWAY_URL").unwrap_or_else(|| {
                warn!("GATEWAY_URL not set, using default {}", DEFAULT_GATEWAY_URL);
                DEFAULT_GATEWAY_URL.to_string()
            }),
            gateway_probe_timeout: Duration::from_secs(parse_or(
                &lookup,
                "GATEWAY_PROBE_TIMEOUT_SECS",
                5,
            )),
            store_query_timeout: Duration::from_millis(parse_or(
                &lookup,
                "STORE_QUERY_TIMEOUT_MS",
                2000,
            )),
            channel_probe_url: lookup("CHANNEL_PROBE_URL").filter(|url| !url.trim().is_empty()),
            channel_probe_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CHANNEL_PROBE_TIMEOUT_SECS",
                5,
            )),
            channel_roster: lookup("MONITOR_CHANNELS")
                .map(|raw| parse_channel_roster(&raw))
                .unwrap_or_default(),
        };

        if !config.has_channel_source() {
            warn!("Neither CHANNEL_PROBE_URL nor MONITOR_CHANNELS set - channel data will be unavailable");
        }

        config
    }

    pub fn costs_db_path(&self) -> PathBuf {
        self.data_dir.join("cost_tracker.db")
    }

    pub fn metrics_db_path(&self) -> PathBuf {
        self.data_dir.join("system_metrics.db")
    }

    pub fn anomalies_db_path(&self) -> PathBuf {
        self.data_dir.join("log_patterns.db")
    }

    pub fn has_channel_source(&self) -> bool {
        self.channel_probe_url.is_some() || !self.channel_roster.is_empty()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Parses `id:name:class:expected` entries separated by commas. Missing trailing
/// fields fall back to the id as name, `secondary` class and `idle` expectation.
pub fn parse_channel_roster(raw: &str) -> Vec<ChannelRosterEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let mut parts = entry.split(':').map(str::trim);
            let id = parts.next().filter(|id| !id.is_empty())?;
            let name = parts.next().filter(|s| !s.is_empty()).unwrap_or(id);
            let class = parts.next().filter(|s| !s.is_empty()).unwrap_or("secondary");
            let expected = parts.next().filter(|s| !s.is_empty()).unwrap_or("idle");

            Some(ChannelRosterEntry {
                id: id.to_string(),
                name: name.to_string(),
                class: class.to_lowercase(),
                expected: expected.to_lowercase(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_resolve_against_home() {
        let config = config_from(&[("HOME", "/home/kuro")]);

        assert_eq!(config.port, 18888);
        assert_eq!(config.gateway_url, "http://127.0.0.1:18789");
        assert_eq!(config.gateway_probe_timeout, Duration::from_secs(5));
        assert_eq!(config.store_query_timeout, Duration::from_millis(2000));
        assert_eq!(
            config.costs_db_path(),
            PathBuf::from("/home/kuro/.openclaw/workspace/monitoring/cost_tracker.db")
        );
        assert!(config.channel_probe_url.is_none());
        assert!(!config.has_channel_source());
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("MONITOR_PORT", "not-a-port"), ("STORE_QUERY_TIMEOUT_MS", "-4")]);

        assert_eq!(config.port, 18888);
        assert_eq!(config.store_query_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_blank_channel_probe_url_is_ignored() {
        let config = config_from(&[("CHANNEL_PROBE_URL", "   ")]);
        assert!(config.channel_probe_url.is_none());
    }

    #[test]
    fn test_parse_channel_roster() {
        let roster = parse_channel_roster("feishu:Feishu:primary:active, telegram:Telegram:Backup, ,imessage");

        assert_eq!(roster.len(), 3);
        assert_eq!(
            roster[0],
            ChannelRosterEntry {
                id: "feishu".to_string(),
                name: "Feishu".to_string(),
                class: "primary".to_string(),
                expected: "active".to_string(),
            }
        );
        assert_eq!(roster[1].class, "backup");
        assert_eq!(roster[1].expected, "idle");
        assert_eq!(roster[2].name, "imessage");
        assert_eq!(roster[2].class, "secondary");
    }
}
