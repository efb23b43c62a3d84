//! Plan construction.
//!
//! All plan shapes come from [`PlanningPolicy::plan`], and it alone decides
//! whether a plan may fall back: only a reuse plan under [`Intent::Auto`]
//! may, and the restart plan substituted for it never does. That keeps the
//! at-most-one-fallback rule in a single place.

use std::time::Duration;

use crate::config::{BackendDefinition, PlanConfig, SelectionConfig};
use crate::plan::{ExecutionPlan, PlanStep, StepTarget};
use crate::probe::ProbeTarget;
use crate::resilience::backoff::Backoff;
use crate::selection::decision::{Intent, PlanKind, PlannedRun};

/// Ceiling for the wait step's poll interval.
const MAX_WAIT_POLL_MS: u64 = 5_000;

/// Timeouts and retry bounds that shape plans.
#[derive(Debug, Clone)]
pub struct PlanningPolicy {
    pub probe_timeout: Duration,
    pub plan: PlanConfig,
    pub selection: SelectionConfig,
}

impl PlanningPolicy {
    pub fn new(probe_timeout: Duration, plan: PlanConfig, selection: SelectionConfig) -> Self {
        Self {
            probe_timeout,
            plan,
            selection,
        }
    }

    /// Build the plan of `kind` for `backend`.
    ///
    /// `endpoint` is only used by reuse plans (it may be a discovered port);
    /// restart plans always target the configured endpoint.
    pub fn plan(
        &self,
        kind: PlanKind,
        intent: Intent,
        backend: &BackendDefinition,
        endpoint: &ProbeTarget,
    ) -> PlannedRun {
        let plan = match kind {
            PlanKind::Reuse => self.reuse_plan(backend, endpoint),
            PlanKind::Restart | PlanKind::ForcedRestart => self.restart_plan(backend),
        };
        PlannedRun {
            kind,
            plan,
            may_fall_back: kind == PlanKind::Reuse && intent == Intent::Auto,
        }
    }

    /// Backoff between probes of a `loading` backend.
    pub fn loading_backoff(&self) -> Backoff {
        Backoff::new(
            self.selection.loading_base_delay_ms,
            self.selection.loading_max_delay_ms,
        )
    }

    fn reuse_plan(&self, backend: &BackendDefinition, endpoint: &ProbeTarget) -> ExecutionPlan {
        let retries = self.selection.loading_retries;
        let attempts = retries.saturating_add(1);
        // Room for every attempt plus the worst-case (jittered) delays.
        let delays_ms = self
            .selection
            .loading_max_delay_ms
            .saturating_mul(u64::from(retries))
            .saturating_mul(11)
            / 10;
        let probe_budget = self
            .probe_timeout
            .saturating_mul(attempts)
            .saturating_add(Duration::from_millis(delays_ms));

        ExecutionPlan::new(vec![
            PlanStep::probe(endpoint.clone(), attempts, self.loading_backoff(), probe_budget),
            PlanStep::run_verify(
                backend.verify_cmd.clone(),
                StepTarget::for_backend(backend.ssh.as_ref()),
                self.plan.verify_timeout(),
            ),
        ])
    }

    fn restart_plan(&self, backend: &BackendDefinition) -> ExecutionPlan {
        let on = StepTarget::for_backend(backend.ssh.as_ref());
        let endpoint = backend.probe_target();
        let wait = Duration::from_secs(
            backend
                .startup_timeout_secs
                .unwrap_or(self.plan.start_wait_secs),
        );
        let base = self.plan.wait_poll_ms;
        let poll = Backoff::new(base, base.saturating_mul(10).min(MAX_WAIT_POLL_MS).max(base));

        let mut steps = Vec::with_capacity(5);
        if let Some(stop) = &backend.stop_cmd {
            steps.push(PlanStep::stop(stop.clone(), on.clone(), self.plan.command_timeout()));
        }
        steps.push(PlanStep::start(backend.start_cmd.clone(), on.clone(), self.plan.command_timeout()));
        steps.push(PlanStep::wait(endpoint.clone(), poll, wait));
        steps.push(PlanStep::probe(endpoint, 1, poll, self.probe_timeout));
        steps.push(PlanStep::run_verify(backend.verify_cmd.clone(), on, self.plan.verify_timeout()));
        ExecutionPlan::new(steps)
    }
}
