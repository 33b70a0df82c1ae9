// =====================================================================================
// CHANNEL STATUS SERVICE
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use reqwest::Client;
use tracing::{debug, error, instrument, warn};

use crate::models::{ChannelClass, ChannelMap, ChannelReport, ChannelState, ChannelStatus, MonitoringError};
use shared_config::{AppConfig, ChannelRosterEntry};

/// Hours (local, inclusive) during which an expected-active roster channel is shown as
/// active.
const ACTIVE_HOURS: std::ops::RangeInclusive<u32> = 9..=22;

/// External source of live per-channel state.
#[async_trait]
pub trait ChannelProbe: Send + Sync {
    async fn check_all_channels(&self) -> Result<ChannelMap, MonitoringError>;
}

/// Fetches channel state as a JSON object of channel id to state.
pub struct HttpChannelProbe {
    client: Client,
    url: String,
}

impl HttpChannelProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ChannelProbe for HttpChannelProbe {
    async fn check_all_channels(&self) -> Result<ChannelMap, MonitoringError> {
        debug!("Requesting channel state from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| MonitoringError::ChannelProbe(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MonitoringError::ChannelProbe(e.to_string()))?;

        if !status.is_success() {
            error!("Channel probe returned {}", status);
            return Err(MonitoringError::ChannelProbe(format!("HTTP {}", status)));
        }

        let mut channels: ChannelMap = serde_json::from_str(&body)
            .map_err(|e| MonitoringError::ChannelProbe(format!("Invalid channel payload: {}", e)))?;

        for (id, state) in channels.iter_mut() {
            if state.id.is_empty() {
                state.id = id.clone();
            }
        }

        Ok(channels)
    }
}

pub struct ChannelAggregator {
    probe: Option<Arc<dyn ChannelProbe>>,
    roster: Vec<ChannelRosterEntry>,
    probe_timeout: Duration,
}

impl ChannelAggregator {
    pub fn new(
        probe: Option<Arc<dyn ChannelProbe>>,
        roster: Vec<ChannelRosterEntry>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            roster,
            probe_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let probe = config
            .channel_probe_url
            .as_ref()
            .map(|url| Arc::new(HttpChannelProbe::new(url.clone())) as Arc<dyn ChannelProbe>);

        Self::new(probe, config.channel_roster.clone(), config.channel_probe_timeout)
    }

    /// A configured probe is authoritative: if it fails, the result is an error
    /// marker rather than roster data.
    #[instrument(skip(self))]
    pub async fn aggregate(&self, now: NaiveDateTime) -> ChannelReport {
        let result = match &self.probe {
            Some(probe) => {
                match tokio::time::timeout(self.probe_timeout, probe.check_all_channels()).await {
                    Ok(result) => result,
                    Err(_) => Err(MonitoringError::ChannelProbe(format!(
                        "timed out after {:?}",
                        self.probe_timeout
                    ))),
                }
            }
            None if !self.roster.is_empty() => Ok(roster_states(&self.roster, now)),
            None => Err(MonitoringError::ChannelProbeNotConfigured),
        };

        match result {
            Ok(channels) => ChannelReport::Channels(channels),
            Err(e) => {
                warn!("Channel data unavailable: {}", e);
                ChannelReport::Unavailable {
                    error: e.to_string(),
                    timestamp: now,
                }
            }
        }
    }
}

/// Expected status for each roster channel at `now`. Traffic counters are unknown
/// without a probe and reported as zero.
pub fn roster_states(roster: &[ChannelRosterEntry], now: NaiveDateTime) -> ChannelMap {
    roster
        .iter()
        .map(|entry| {
            let status = match ChannelStatus::parse(&entry.expected) {
                ChannelStatus::Active if ACTIVE_HOURS.contains(&now.hour()) => ChannelStatus::Active,
                ChannelStatus::Active => ChannelStatus::Idle,
                other => other,
            };

            let state = ChannelState {
                id: entry.id.clone(),
                name: entry.name.clone(),
                status,
                received: 0,
                sent: 0,
                errors: 0,
                class: ChannelClass::parse(&entry.class),
            };
            (entry.id.clone(), state)
        })
        .collect()
}
