//! Single-target HTTP probing.
//!
//! # Responsibilities
//! - `GET /v1/models`, falling back to `GET /health` on connect failure or timeout
//! - Fold every outcome, including timeouts, into a [`Classification`]
//!
//! # Design Decisions
//! - The primary endpoint gets two thirds of the budget so the fallback
//!   always has time left when the primary hangs
//! - No body is read; only the status line matters
//! - Fresh connection per probe (no idle pooling) so a restarted server is
//!   never judged through a stale socket

use std::time::{Duration, Instant};
use tokio::time;
use url::Url;

use crate::config::ProbeConfig;
use crate::observability::metrics;
use crate::probe::types::{Classification, ProbeResult, ProbeTarget};

pub const MODELS_PATH: &str = "/v1/models";
pub const HEALTH_PATH: &str = "/health";

/// What a single HTTP attempt produced.
#[derive(Debug)]
enum Attempt {
    /// A status line was read.
    Response(u16),
    /// Connected, but the exchange broke down.
    Malformed(String),
    /// Could not connect, or nothing came back in time.
    Unreachable(String),
}

/// Issues bounded health probes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    client: reqwest::Client,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .no_proxy()
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// Configured per-probe budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe with the configured budget.
    pub async fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        self.probe_within(target, self.timeout).await
    }

    /// Probe with an explicit total budget covering both endpoints.
    pub async fn probe_within(&self, target: &ProbeTarget, budget: Duration) -> ProbeResult {
        let started = Instant::now();
        let deadline = started + budget;

        let base = match target.base_url() {
            Ok(url) => url,
            Err(e) => {
                let result = ProbeResult {
                    target: target.clone(),
                    classification: Classification::Unknown,
                    status: None,
                    endpoint: None,
                    latency: started.elapsed(),
                    detail: Some(format!("invalid target url: {}", e)),
                };
                metrics::record_probe(&result);
                return result;
            }
        };

        let primary_budget = budget * 2 / 3;
        let (attempt, endpoint) = match self.attempt(&base, MODELS_PATH, primary_budget).await {
            Attempt::Unreachable(primary_reason) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    (Attempt::Unreachable(primary_reason), MODELS_PATH)
                } else {
                    match self.attempt(&base, HEALTH_PATH, remaining).await {
                        Attempt::Unreachable(fallback_reason) => (
                            Attempt::Unreachable(format!(
                                "{}: {}; {}: {}",
                                MODELS_PATH, primary_reason, HEALTH_PATH, fallback_reason
                            )),
                            HEALTH_PATH,
                        ),
                        other => (other, HEALTH_PATH),
                    }
                }
            }
            other => (other, MODELS_PATH),
        };

        let (classification, status, detail) = match attempt {
            Attempt::Response(status) => {
                let classification = Classification::from_status(status);
                let detail = match classification {
                    Classification::Unknown => Some(format!("unexpected HTTP {} on {}", status, endpoint)),
                    _ => None,
                };
                (classification, Some(status), detail)
            }
            Attempt::Malformed(reason) => (Classification::Unknown, None, Some(reason)),
            Attempt::Unreachable(reason) => (Classification::Down, None, Some(reason)),
        };

        let result = ProbeResult {
            target: target.clone(),
            classification,
            status,
            endpoint: status.map(|_| endpoint),
            latency: started.elapsed(),
            detail,
        };

        tracing::debug!(
            endpoint = %result.target,
            classification = %result.classification,
            status = ?result.status,
            latency_ms = result.latency.as_millis() as u64,
            "probe finished"
        );
        metrics::record_probe(&result);
        result
    }

    async fn attempt(&self, base: &Url, path: &str, budget: Duration) -> Attempt {
        let url = match base.join(path) {
            Ok(url) => url,
            Err(e) => return Attempt::Malformed(format!("invalid url: {}", e)),
        };

        match time::timeout(budget, self.client.get(url).send()).await {
            Ok(Ok(response)) => Attempt::Response(response.status().as_u16()),
            Ok(Err(e)) if e.is_connect() || e.is_timeout() => Attempt::Unreachable(root_cause(&e)),
            Ok(Err(e)) => Attempt::Malformed(root_cause(&e)),
            Err(_) => Attempt::Unreachable(format!("timed out after {}ms", budget.as_millis())),
        }
    }
}

/// Innermost error message, e.g. "Connection refused (os error 111)".
fn root_cause(e: &(dyn std::error::Error + 'static)) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
