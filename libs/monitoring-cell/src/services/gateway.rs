// =====================================================================================
// GATEWAY LIVENESS PROBE
// =====================================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::models::ProbeResult;
use shared_config::AppConfig;
use shared_utils::format::round2;

pub struct GatewayProbe {
    client: Client,
    target: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl GatewayProbe {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            target: target.into(),
            timeout,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.gateway_url.clone(), config.gateway_probe_timeout)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Probes the configured gateway.
    pub async fn check(&self) -> ProbeResult {
        self.probe(&self.target, self.timeout).await
    }

    /// Sends a HEAD request to `target`. Every outcome, including a refused
    /// connection or an elapsed timeout, is reported as a `ProbeResult`.
    #[instrument(skip(self))]
    pub async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        let outcome = self.client.head(target).timeout(timeout).send().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let timestamp = self.clock.now();

        match outcome {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!("Gateway healthy in {:.2}ms", elapsed_ms);
                ProbeResult {
                    running: true,
                    healthy: true,
                    http_status: StatusCode::OK.as_u16(),
                    response_time_ms: round2(elapsed_ms),
                    port_open: true,
                    error: None,
                    timestamp,
                }
            }
            Ok(response) => {
                let status = response.status();
                warn!("Gateway reachable but returned {}", status);
                ProbeResult {
                    running: true,
                    healthy: false,
                    http_status: status.as_u16(),
                    response_time_ms: 0.0,
                    port_open: true,
                    error: Some(format!(
                        "HTTP Error {}: {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    )),
                    timestamp,
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("timed out after {:?}", timeout)
                } else {
                    e.to_string()
                };
                warn!("Gateway unreachable: {}", error);
                ProbeResult {
                    running: false,
                    healthy: false,
                    http_status: 0,
                    response_time_ms: 0.0,
                    port_open: false,
                    error: Some(error),
                    timestamp,
                }
            }
        }
    }
}
