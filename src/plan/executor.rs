//! Sequential, fail-fast plan execution.
//!
//! # Responsibilities
//! - Run steps strictly in order, one at a time
//! - Stop at the first failing step (best-effort steps excepted)
//! - Clamp every step to the plan deadline
//! - Capture bounded stdout/stderr excerpts per step

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::{PlanConfig, SshConfig};
use crate::observability::metrics;
use crate::plan::excerpt::excerpt_bytes;
use crate::plan::remote::{CommandOutput, LocalExecutor, RemoteExecutor, SshExecutor};
use crate::plan::types::{
    ExecutionPlan, PlanOutcome, PlanStep, PlanStepResult, StepAction, StepTarget,
};
use crate::probe::{Classification, ProbeExecutor, ProbeTarget};
use crate::resilience::backoff::Backoff;
use crate::resilience::timeouts::Deadline;

/// Executes [`ExecutionPlan`]s.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    probe: ProbeExecutor,
    ssh: SshConfig,
    excerpt_chars: usize,
    plan_timeout: Duration,
}

impl PlanExecutor {
    pub fn new(probe: ProbeExecutor, ssh: SshConfig, plan: &PlanConfig) -> Self {
        Self {
            probe,
            ssh,
            excerpt_chars: plan.excerpt_chars,
            plan_timeout: plan.plan_timeout(),
        }
    }

    /// Run `plan` under the configured whole-plan timeout.
    pub async fn execute(&self, plan: &ExecutionPlan) -> PlanOutcome {
        self.execute_until(plan, Deadline::after(self.plan_timeout)).await
    }

    /// Run `plan`, abandoning remaining work at `deadline`.
    pub async fn execute_until(&self, plan: &ExecutionPlan, deadline: Deadline) -> PlanOutcome {
        let session = Uuid::new_v4();
        let mut executors: HashMap<StepTarget, Arc<dyn RemoteExecutor>> = HashMap::new();
        let mut results = Vec::with_capacity(plan.len());
        let mut success = true;

        for (index, step) in plan.steps().iter().enumerate() {
            tracing::info!(step = index, kind = %step.kind(), label = %step.label, "step starting");

            let result = if deadline.is_expired() {
                let mut result = PlanStepResult::new(index, step);
                result.message = Some("plan deadline exceeded before step started".to_string());
                result
            } else {
                self.run_step(index, step, deadline, &mut executors, session).await
            };

            metrics::record_step(step.kind().as_str(), result.success);
            let failed = !result.success;
            if failed {
                tracing::warn!(
                    step = index,
                    kind = %step.kind(),
                    detail = %result.detail(),
                    "step failed, abandoning plan"
                );
            } else {
                tracing::info!(
                    step = index,
                    kind = %step.kind(),
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "step succeeded"
                );
            }
            results.push(result);

            if failed {
                success = false;
                break;
            }
        }

        for executor in executors.values() {
            executor.close().await;
        }

        PlanOutcome { results, success }
    }

    async fn run_step(
        &self,
        index: usize,
        step: &PlanStep,
        deadline: Deadline,
        executors: &mut HashMap<StepTarget, Arc<dyn RemoteExecutor>>,
        session: Uuid,
    ) -> PlanStepResult {
        let timeout = deadline.fit(step.timeout);
        let started = Instant::now();
        let mut result = PlanStepResult::new(index, step);

        match &step.action {
            StepAction::Probe {
                endpoint,
                attempts,
                backoff,
            } => {
                self.run_probe(&mut result, endpoint, *attempts, *backoff, Deadline::after(timeout))
                    .await;
            }
            StepAction::Wait { endpoint, poll } => {
                self.run_wait(&mut result, endpoint, *poll, timeout).await;
            }
            StepAction::RunVerify { command }
            | StepAction::StartBackend { command }
            | StepAction::StopBackend { command } => {
                let executor = self.executor_for(&step.target, executors, session);
                tracing::debug!(on = %executor.describe(), command = %command, "running command");
                let output = executor.run(command, timeout).await;
                self.apply_output(&mut result, step, output);
            }
        }

        result.elapsed = started.elapsed();
        result
    }

    fn executor_for(
        &self,
        target: &StepTarget,
        executors: &mut HashMap<StepTarget, Arc<dyn RemoteExecutor>>,
        session: Uuid,
    ) -> Arc<dyn RemoteExecutor> {
        executors
            .entry(target.clone())
            .or_insert_with(|| {
                let executor: Arc<dyn RemoteExecutor> = match target {
                    StepTarget::Local => Arc::new(LocalExecutor::new()),
                    StepTarget::Ssh(ssh) => Arc::new(SshExecutor::new(ssh.clone(), &self.ssh, session)),
                };
                executor
            })
            .clone()
    }

    fn apply_output(&self, result: &mut PlanStepResult, step: &PlanStep, output: CommandOutput) {
        result.exit_code = output.exit_code;
        result.stdout = excerpt_bytes(&output.stdout, self.excerpt_chars);
        result.stderr = excerpt_bytes(&output.stderr, self.excerpt_chars);

        match output.failure_reason() {
            None => result.success = true,
            Some(reason) if step.best_effort => {
                result.success = true;
                result.message = Some(format!("{} (ignored, best-effort)", reason));
            }
            Some(reason) => result.message = Some(reason),
        }
    }

    /// Probe up to `attempts` times, retrying only while `loading`.
    async fn run_probe(
        &self,
        result: &mut PlanStepResult,
        endpoint: &ProbeTarget,
        attempts: u32,
        backoff: Backoff,
        step_deadline: Deadline,
    ) {
        for attempt in 1..=attempts.max(1) {
            if attempt > 1 {
                let delay = backoff.delay(attempt - 1);
                if delay >= step_deadline.remaining() {
                    tracing::debug!(attempt, "no time left for another loading probe");
                    break;
                }
                tokio::time::sleep(delay).await;
            }

            let probe = self
                .probe
                .probe_within(endpoint, step_deadline.fit(self.probe.timeout()))
                .await;
            let classification = probe.classification;
            result.probes.push(probe);

            if classification != Classification::Loading {
                break;
            }
            tracing::info!(endpoint = %endpoint, attempt, attempts, "backend still loading");
        }

        let Some(last) = result.probes.last() else {
            return;
        };
        result.success = last.is_ready();
        if !result.success {
            let mut message = match last.classification {
                Classification::Loading => format!(
                    "{} still loading after {} probe(s)",
                    endpoint,
                    result.probes.len()
                ),
                other => format!("{} classified {}", endpoint, other),
            };
            if let Some(detail) = &last.detail {
                message.push_str(": ");
                message.push_str(detail);
            }
            result.message = Some(message);
        }
    }

    /// Poll until `ready` or `timeout` elapses.
    async fn run_wait(
        &self,
        result: &mut PlanStepResult,
        endpoint: &ProbeTarget,
        poll: Backoff,
        timeout: Duration,
    ) {
        let step_deadline = Deadline::after(timeout);
        let mut polls = 0u32;

        loop {
            polls += 1;
            let probe = self
                .probe
                .probe_within(endpoint, step_deadline.fit(self.probe.timeout()))
                .await;
            let classification = probe.classification;
            result.probes.clear();
            result.probes.push(probe);

            if classification == Classification::Ready {
                result.success = true;
                result.message = Some(format!("ready after {} poll(s)", polls));
                return;
            }

            let delay = poll.delay(polls);
            if delay >= step_deadline.remaining() {
                result.message = Some(format!(
                    "{} not ready within {:.0}s ({} poll(s), last classified {})",
                    endpoint,
                    timeout.as_secs_f64(),
                    polls,
                    classification
                ));
                return;
            }
            tracing::debug!(endpoint = %endpoint, polls, classification = %classification, "waiting for backend");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use crate::plan::types::StepKind;

    fn executor() -> PlanExecutor {
        let probe = ProbeExecutor::new(&ProbeConfig {
            timeout_ms: 300,
            ..ProbeConfig::default()
        })
        .unwrap();
        PlanExecutor::new(probe, SshConfig::default(), &PlanConfig::default())
    }

    fn local(cmd: &str) -> PlanStep {
        PlanStep::run_verify(cmd, StepTarget::Local, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fail_fast_skips_later_steps() {
        let plan = ExecutionPlan::new(vec![local("true"), local("echo broken >&2; exit 1"), local("true")]);
        let outcome = executor().execute(&plan).await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].success);
        assert!(!outcome.results[1].success);
        assert_eq!(outcome.results[1].exit_code, Some(1));
        assert_eq!(outcome.last_failure().unwrap().detail(), "exit status 1: broken");
    }

    #[tokio::test]
    async fn test_all_steps_succeed_in_order() {
        let plan = ExecutionPlan::new(vec![local("echo one"), local("echo two")]);
        let outcome = executor().execute(&plan).await;

        assert!(outcome.success);
        let indices: Vec<usize> = outcome.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(outcome.results[1].stdout, "two");
    }

    #[tokio::test]
    async fn test_best_effort_stop_failure_continues() {
        let plan = ExecutionPlan::new(vec![
            PlanStep::stop("echo nothing to stop >&2; exit 1", StepTarget::Local, Duration::from_secs(5)),
            PlanStep::start("true", StepTarget::Local, Duration::from_secs(5)),
        ]);
        let outcome = executor().execute(&plan).await;

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].message.as_deref().unwrap().contains("best-effort"));
    }

    #[tokio::test]
    async fn test_step_timeout_kills_command() {
        let plan = ExecutionPlan::new(vec![
            PlanStep::start("sleep 30", StepTarget::Local, Duration::from_millis(200)),
            local("true"),
        ]);
        let started = Instant::now();
        let outcome = executor().execute(&plan).await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].detail().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_start_command_that_backgrounds_server_succeeds() {
        let plan = ExecutionPlan::new(vec![
            PlanStep::start("sleep 5 &", StepTarget::Local, Duration::from_secs(3)),
            local("true"),
        ]);
        let started = Instant::now();
        let outcome = executor().execute(&plan).await;

        assert!(outcome.success, "{:?}", outcome.last_failure().map(|r| r.detail()));
        assert_eq!(outcome.results.len(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_without_running() {
        let plan = ExecutionPlan::new(vec![local("true")]);
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        let outcome = executor().execute_until(&plan, deadline).await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].detail().contains("deadline"));
    }

    #[tokio::test]
    async fn test_output_is_excerpted() {
        let probe = ProbeExecutor::new(&ProbeConfig::default()).unwrap();
        let executor = PlanExecutor::new(
            probe,
            SshConfig::default(),
            &PlanConfig {
                excerpt_chars: 32,
                ..PlanConfig::default()
            },
        );
        let plan = ExecutionPlan::new(vec![local("for i in $(seq 1 200); do echo line $i; done; exit 2")]);
        let outcome = executor.execute(&plan).await;

        let result = &outcome.results[0];
        assert!(result.stdout.chars().count() <= 32);
        assert!(result.stdout.ends_with("line 200"));
        assert_eq!(result.kind, StepKind::RunVerify);
    }

    #[tokio::test]
    async fn test_probe_step_against_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = ProbeTarget::new(crate::probe::Scheme::Http, "127.0.0.1", port);
        let plan = ExecutionPlan::new(vec![
            PlanStep::probe(endpoint, 3, Backoff::new(10, 20), Duration::from_secs(2)),
            local("true"),
        ]);
        let outcome = executor().execute(&plan).await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        // down is not retried; only loading is
        assert_eq!(outcome.results[0].probes.len(), 1);
        assert_eq!(outcome.last_probe().unwrap().classification, Classification::Down);
    }
}
