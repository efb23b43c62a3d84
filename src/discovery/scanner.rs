//! Bounded concurrent probing across hosts × ports.
//!
//! # Responsibilities
//! - Expand hosts × ports into deduplicated probe targets
//! - Probe them concurrently, never more than `concurrency` at once
//! - Stop at the scan deadline and report unfinished targets as `down`
//!
//! # Design Decisions
//! - A semaphore gates the probe tasks, the same backpressure shape as a
//!   bounded listener
//! - Results land in a map keyed by target identity; completion order is
//!   irrelevant
//! - Nothing is dropped: every target gets exactly one result

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ScanConfig;
use crate::probe::types::serialize_millis;
use crate::probe::{Classification, ProbeExecutor, ProbeResult, ProbeTarget, Scheme};
use crate::resilience::Deadline;

/// A host to sweep, with the scheme to speak to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanHost {
    pub host: String,
    pub scheme: Scheme,
}

impl ScanHost {
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            scheme,
        }
    }
}

/// Every target's result, plus whether the scan was cut short.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// One result per target, sorted by target.
    pub results: Vec<ProbeResult>,
    /// True if the scan deadline expired before every probe finished.
    pub deadline_hit: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn get(&self, target: &ProbeTarget) -> Option<&ProbeResult> {
        self.results.iter().find(|r| &r.target == target)
    }

    /// Targets that answered as ready.
    pub fn ready(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.is_ready())
    }

    /// Number of targets classified `down`.
    pub fn unreachable(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.classification == Classification::Down)
            .count()
    }
}

/// Runs many probes with a ceiling on in-flight sockets.
#[derive(Debug, Clone)]
pub struct Scanner {
    probe: ProbeExecutor,
    concurrency: usize,
    timeout: Duration,
}

impl Scanner {
    pub fn new(probe: ProbeExecutor, config: &ScanConfig) -> Self {
        Self {
            probe,
            concurrency: config.concurrency.max(1),
            timeout: config.timeout(),
        }
    }

    /// Cross product of hosts and ports, deduplicated and sorted.
    pub fn expand(hosts: &[ScanHost], ports: &[u16]) -> Vec<ProbeTarget> {
        let set: BTreeSet<ProbeTarget> = hosts
            .iter()
            .flat_map(|h| {
                ports
                    .iter()
                    .map(move |&p| ProbeTarget::new(h.scheme, h.host.clone(), p))
            })
            .collect();
        set.into_iter().collect()
    }

    /// Scan hosts × ports with the configured wall-clock limit.
    pub async fn scan(&self, hosts: &[ScanHost], ports: &[u16]) -> ScanReport {
        self.scan_targets(Self::expand(hosts, ports)).await
    }

    /// Probe explicit targets with the configured wall-clock limit.
    pub async fn scan_targets(&self, targets: Vec<ProbeTarget>) -> ScanReport {
        self.scan_until(targets, Deadline::after(self.timeout).instant()).await
    }

    /// Probe explicit targets, abandoning whatever is unfinished at `deadline`.
    pub async fn scan_until(&self, targets: Vec<ProbeTarget>, deadline: Instant) -> ScanReport {
        let started = Instant::now();
        let targets: Vec<ProbeTarget> = targets
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::debug!(
            targets = targets.len(),
            concurrency = self.concurrency,
            "scan starting"
        );

        let results: Arc<DashMap<ProbeTarget, ProbeResult>> = Arc::new(DashMap::new());
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for target in targets.iter().cloned() {
            let permits = permits.clone();
            let results = results.clone();
            let probe = self.probe.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                // Never outlive the scan deadline.
                let remaining = deadline.saturating_duration_since(Instant::now());
                let budget = probe.timeout().min(remaining);
                let result = probe.probe_within(&target, budget).await;
                results.insert(target, result);
            });
        }

        let drained = tokio::time::timeout_at(deadline.into(), async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "probe task failed");
                }
            }
        })
        .await;

        let deadline_hit = drained.is_err();
        if deadline_hit {
            tasks.abort_all();
            tracing::warn!(
                finished = results.len(),
                total = targets.len(),
                "scan deadline reached, abandoning in-flight probes"
            );
        }

        let elapsed = started.elapsed();
        let results = targets
            .into_iter()
            .map(|target| match results.remove(&target) {
                Some((_, result)) => result,
                None => ProbeResult::abandoned(target, elapsed),
            })
            .collect();

        ScanReport {
            results,
            deadline_hit,
            elapsed,
        }
    }
}
