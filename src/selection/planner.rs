//! Reuse-or-restart orchestration for one backend.

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{BackendDefinition, PilotConfig};
use crate::discovery::{PortSpec, ScanHost, Scanner};
use crate::observability::metrics;
use crate::plan::PlanExecutor;
use crate::probe::{Classification, ProbeExecutor, ProbeTarget};
use crate::resilience::timeouts::Deadline;
use crate::selection::active::ActivePlans;
use crate::selection::decision::{Intent, PlanAttempt, PlanKind, SelectionDecision};
use crate::selection::policy::PlanningPolicy;

/// Errors raised before any plan runs.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("no backends configured")]
    NoBackends,

    #[error("selection {run_id} is already running for backend '{backend}'")]
    AlreadyActive { backend: String, run_id: Uuid },
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectRequest<'a> {
    pub intent: Intent,
    /// Ports on the backend's host to sweep for an already-running instance.
    pub scan: Option<&'a PortSpec>,
    /// Outer limit on top of each plan's own timeout.
    pub deadline: Option<Deadline>,
}

/// Decides between reusing and restarting a backend, then drives the plan.
#[derive(Debug, Clone)]
pub struct SelectionPlanner {
    policy: PlanningPolicy,
    executor: PlanExecutor,
    scanner: Scanner,
    active: ActivePlans,
}

impl SelectionPlanner {
    pub fn new(config: &PilotConfig, probe: ProbeExecutor) -> Self {
        Self {
            policy: PlanningPolicy::new(
                probe.timeout(),
                config.plan.clone(),
                config.selection.clone(),
            ),
            executor: PlanExecutor::new(probe.clone(), config.ssh.clone(), &config.plan),
            scanner: Scanner::new(probe, &config.scan),
            active: ActivePlans::new(),
        }
    }

    pub fn policy(&self) -> &PlanningPolicy {
        &self.policy
    }

    pub fn active(&self) -> &ActivePlans {
        &self.active
    }

    /// Resolve `name` (or the default) against `config`.
    pub fn resolve<'c>(
        config: &'c PilotConfig,
        name: Option<&str>,
    ) -> Result<&'c BackendDefinition, SelectError> {
        if config.backends.is_empty() {
            return Err(SelectError::NoBackends);
        }
        config.backend(name).ok_or_else(|| {
            SelectError::UnknownBackend(
                name.or(config.default_backend.as_deref())
                    .unwrap_or_default()
                    .to_string(),
            )
        })
    }

    /// Select `backend`, reusing it when possible.
    ///
    /// A failed reuse under [`Intent::Auto`] is answered with exactly one
    /// restart plan; if that fails too the decision is returned as failed.
    pub async fn select(
        &self,
        backend: &BackendDefinition,
        request: SelectRequest<'_>,
    ) -> Result<SelectionDecision, SelectError> {
        let run_id = Uuid::new_v4();
        let _guard = self
            .active
            .acquire(&backend.name, run_id)
            .map_err(|holder| SelectError::AlreadyActive {
                backend: backend.name.clone(),
                run_id: holder,
            })?;

        let span = tracing::info_span!("select", %run_id, backend = %backend.name);
        let decision = self.run(run_id, backend, request).instrument(span).await;

        metrics::record_selection(decision.strategy.as_str(), decision.is_ready());
        metrics::record_backend_ready(&decision.endpoint.to_string(), decision.is_ready());
        Ok(decision)
    }

    async fn run(
        &self,
        run_id: Uuid,
        backend: &BackendDefinition,
        request: SelectRequest<'_>,
    ) -> SelectionDecision {
        let configured = backend.probe_target();
        let endpoint = match (request.intent, request.scan) {
            (Intent::ForceRestart, _) | (_, None) => configured.clone(),
            (_, Some(spec)) => self.discover(backend, spec).await,
        };

        let first = match request.intent {
            Intent::ForceRestart => PlanKind::ForcedRestart,
            Intent::Auto | Intent::ForceReuse => PlanKind::Reuse,
        };
        tracing::info!(strategy = %first, endpoint = %endpoint, "selection starting");

        let mut run = self.policy.plan(first, request.intent, backend, &endpoint);
        let mut run_endpoint = endpoint;
        let mut attempts = Vec::with_capacity(2);

        loop {
            let deadline = Deadline::after(self.policy.plan.plan_timeout()).earliest(request.deadline);
            let outcome = self.executor.execute_until(&run.plan, deadline).await;
            let succeeded = outcome.success;
            let may_fall_back = run.may_fall_back;

            if !succeeded {
                if let Some(failed) = outcome.last_failure() {
                    tracing::warn!(
                        strategy = %run.kind,
                        step = failed.index,
                        kind = %failed.kind,
                        detail = %failed.detail(),
                        "plan failed"
                    );
                }
            }
            attempts.push(PlanAttempt {
                kind: run.kind,
                plan: run.plan,
                outcome,
            });

            if succeeded || !may_fall_back {
                break;
            }
            tracing::warn!("reuse failed, falling back to restart");
            run = self.policy.plan(PlanKind::Restart, request.intent, backend, &configured);
            run_endpoint = configured.clone();
        }

        let strategy = attempts.last().map_or(first, |a| a.kind);
        let classification = attempts
            .last()
            .and_then(|a| a.outcome.last_probe())
            .map_or(Classification::Unknown, |p| p.classification);

        let decision = SelectionDecision {
            run_id,
            backend: backend.name.clone(),
            strategy,
            fell_back: attempts.len() > 1,
            endpoint: run_endpoint,
            attempts,
            classification,
        };

        if decision.is_ready() {
            tracing::info!(
                strategy = %decision.strategy,
                endpoint = %decision.endpoint,
                "{}",
                decision.summary()
            );
        } else {
            tracing::error!(
                strategy = %decision.strategy,
                classification = %decision.classification,
                "selection failed"
            );
        }
        decision
    }

    /// Sweep the backend's host for a ready instance.
    ///
    /// The configured port wins when it is ready; otherwise the lowest ready
    /// port found. Nothing ready leaves the configured endpoint in place.
    async fn discover(&self, backend: &BackendDefinition, spec: &PortSpec) -> ProbeTarget {
        let configured = backend.probe_target();
        let mut ports = spec.ports();
        ports.push(configured.port);

        let hosts = [ScanHost::new(backend.scheme, backend.host.clone())];
        let report = self.scanner.scan(&hosts, &ports).await;

        if report.get(&configured).is_some_and(|r| r.is_ready()) {
            return configured;
        }
        let found = report.ready().next().map(|r| r.target.clone());
        match found {
            Some(discovered) => {
                tracing::info!(
                    configured = %configured,
                    discovered = %discovered,
                    "using discovered endpoint"
                );
                discovered
            }
            None => {
                tracing::debug!(scanned = report.results.len(), "no ready endpoint discovered");
                configured
            }
        }
    }
}
