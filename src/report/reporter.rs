//! Health aggregation over configured and discovered targets.

use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::PilotConfig;
use crate::discovery::{PortSpec, ScanHost, Scanner};
use crate::observability::metrics;
use crate::probe::{Classification, ProbeResult, ProbeTarget, Scheme};

/// Host swept when nothing else names one.
pub const DEFAULT_SCAN_HOST: &str = "localhost";

/// How a row's target became known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Configured,
    Discovered,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Configured => "configured",
            Origin::Discovered => "discovered",
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRow {
    /// Configured backend name; `None` for discovered targets.
    pub backend: Option<String>,
    pub target: ProbeTarget,
    pub origin: Origin,
    pub classification: Classification,
    pub status: Option<u16>,
    #[serde(serialize_with = "crate::probe::types::serialize_millis")]
    pub latency: Duration,
    pub detail: Option<String>,
}

impl HealthRow {
    fn from_probe(backend: Option<String>, origin: Origin, result: ProbeResult) -> Self {
        Self {
            backend,
            target: result.target,
            origin,
            classification: result.classification,
            status: result.status,
            latency: result.latency,
            detail: result.detail,
        }
    }
}

/// Presentation-ready health summary.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Configured rows in configuration order, then discovered rows by target.
    pub rows: Vec<HealthRow>,
    /// Targets probed, configured and discovered.
    pub scanned: usize,
    /// Targets that classified `down`.
    pub unreachable: usize,
    /// Discovered `down` rows left out of `rows`.
    pub hidden_down: usize,
    pub deadline_hit: bool,
    #[serde(serialize_with = "crate::probe::types::serialize_millis")]
    pub elapsed: Duration,
}

impl HealthReport {
    pub fn configured(&self) -> impl Iterator<Item = &HealthRow> {
        self.rows.iter().filter(|r| r.origin == Origin::Configured)
    }

    pub fn discovered(&self) -> impl Iterator<Item = &HealthRow> {
        self.rows.iter().filter(|r| r.origin == Origin::Discovered)
    }
}

/// What to sweep beyond the configured backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthRequest<'a> {
    pub scan: Option<&'a PortSpec>,
    /// Hosts to sweep; empty means the configured backends' hosts.
    pub hosts: &'a [String],
    /// Keep discovered `down` rows.
    pub show_all: bool,
}

/// Read-only view of backend health. Never runs plans.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    scanner: Scanner,
}

impl HealthReporter {
    pub fn new(scanner: Scanner) -> Self {
        Self { scanner }
    }

    pub async fn report(&self, config: &PilotConfig, request: HealthRequest<'_>) -> HealthReport {
        let configured: Vec<(String, ProbeTarget)> = config
            .backends
            .iter()
            .map(|b| (b.name.clone(), b.probe_target()))
            .collect();
        let known: HashSet<&ProbeTarget> = configured.iter().map(|(_, t)| t).collect();

        let discovered: Vec<ProbeTarget> = match request.scan {
            Some(spec) => {
                let hosts = scan_hosts(config, request.hosts);
                Scanner::expand(&hosts, &spec.ports())
                    .into_iter()
                    .filter(|t| !known.contains(t))
                    .collect()
            }
            None => Vec::new(),
        };

        let mut targets: Vec<ProbeTarget> = configured.iter().map(|(_, t)| t.clone()).collect();
        targets.extend(discovered.iter().cloned());

        tracing::debug!(
            configured = configured.len(),
            discovered = discovered.len(),
            "health sweep starting"
        );
        let scan = self.scanner.scan_targets(targets).await;

        let mut rows = Vec::with_capacity(scan.results.len());
        for (name, target) in &configured {
            let result = scan
                .get(target)
                .cloned()
                .unwrap_or_else(|| ProbeResult::abandoned(target.clone(), scan.elapsed));
            metrics::record_backend_ready(&target.to_string(), result.is_ready());
            rows.push(HealthRow::from_probe(Some(name.clone()), Origin::Configured, result));
        }

        let mut hidden_down = 0;
        for result in scan.results.iter().filter(|r| !known.contains(&r.target)) {
            if result.classification == Classification::Down && !request.show_all {
                hidden_down += 1;
                continue;
            }
            rows.push(HealthRow::from_probe(None, Origin::Discovered, result.clone()));
        }

        HealthReport {
            rows,
            scanned: scan.results.len(),
            unreachable: scan.unreachable(),
            hidden_down,
            deadline_hit: scan.deadline_hit,
            elapsed: scan.elapsed,
        }
    }
}

/// Hosts to sweep: explicit ones, else every configured host, else localhost.
fn scan_hosts(config: &PilotConfig, explicit: &[String]) -> Vec<ScanHost> {
    let mut hosts: Vec<ScanHost> = if explicit.is_empty() {
        config
            .backends
            .iter()
            .map(|b| ScanHost::new(b.scheme, b.host.clone()))
            .collect()
    } else {
        explicit
            .iter()
            .map(|h| ScanHost::new(Scheme::Http, h.clone()))
            .collect()
    };
    if hosts.is_empty() {
        hosts.push(ScanHost::new(Scheme::Http, DEFAULT_SCAN_HOST));
    }
    hosts.sort();
    hosts.dedup();
    hosts
}
