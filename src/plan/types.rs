//! Plan and step value types.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::SshTarget;
use crate::probe::types::serialize_millis;
use crate::probe::{ProbeResult, ProbeTarget};
use crate::resilience::backoff::Backoff;

/// The five kinds of plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Probe,
    RunVerify,
    StartBackend,
    StopBackend,
    Wait,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Probe => "probe",
            StepKind::RunVerify => "run_verify",
            StepKind::StartBackend => "start_backend",
            StepKind::StopBackend => "stop_backend",
            StepKind::Wait => "wait",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a step's command runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepTarget {
    Local,
    Ssh(SshTarget),
}

impl StepTarget {
    pub fn for_backend(ssh: Option<&SshTarget>) -> Self {
        match ssh {
            Some(ssh) => StepTarget::Ssh(ssh.clone()),
            None => StepTarget::Local,
        }
    }
}

impl fmt::Display for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepTarget::Local => f.write_str("local"),
            StepTarget::Ssh(t) => write!(f, "ssh {}", t),
        }
    }
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Probe `endpoint`; while it reports `loading`, retry up to `attempts`
    /// times in total, spaced by `backoff`. Passes only on `ready`.
    Probe {
        endpoint: ProbeTarget,
        attempts: u32,
        backoff: Backoff,
    },
    RunVerify { command: String },
    StartBackend { command: String },
    StopBackend { command: String },
    /// Poll `endpoint` until it reports `ready` or the step times out.
    Wait { endpoint: ProbeTarget, poll: Backoff },
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            StepAction::Probe { .. } => StepKind::Probe,
            StepAction::RunVerify { .. } => StepKind::RunVerify,
            StepAction::StartBackend { .. } => StepKind::StartBackend,
            StepAction::StopBackend { .. } => StepKind::StopBackend,
            StepAction::Wait { .. } => StepKind::Wait,
        }
    }
}

/// One unit of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub action: StepAction,
    pub target: StepTarget,
    #[serde(serialize_with = "serialize_millis")]
    pub timeout: Duration,
    /// Human-readable label for progress and failure output.
    pub label: String,
    /// A failure is recorded but does not stop the plan.
    pub best_effort: bool,
}

impl PlanStep {
    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    pub fn probe(endpoint: ProbeTarget, attempts: u32, backoff: Backoff, timeout: Duration) -> Self {
        let label = if attempts > 1 {
            format!("probe {} (up to {} attempts while loading)", endpoint, attempts)
        } else {
            format!("probe {}", endpoint)
        };
        Self {
            action: StepAction::Probe {
                endpoint,
                attempts: attempts.max(1),
                backoff,
            },
            target: StepTarget::Local,
            timeout,
            label,
            best_effort: false,
        }
    }

    pub fn wait(endpoint: ProbeTarget, poll: Backoff, timeout: Duration) -> Self {
        Self {
            label: format!("wait for {} to become ready", endpoint),
            action: StepAction::Wait { endpoint, poll },
            target: StepTarget::Local,
            timeout,
            best_effort: false,
        }
    }

    pub fn run_verify(command: impl Into<String>, target: StepTarget, timeout: Duration) -> Self {
        Self {
            label: format!("verify on {}", target),
            action: StepAction::RunVerify { command: command.into() },
            target,
            timeout,
            best_effort: false,
        }
    }

    pub fn start(command: impl Into<String>, target: StepTarget, timeout: Duration) -> Self {
        Self {
            label: format!("start backend on {}", target),
            action: StepAction::StartBackend { command: command.into() },
            target,
            timeout,
            best_effort: false,
        }
    }

    /// Stop steps are best-effort: nothing running is not an error.
    pub fn stop(command: impl Into<String>, target: StepTarget, timeout: Duration) -> Self {
        Self {
            label: format!("stop backend on {}", target),
            action: StepAction::StopBackend { command: command.into() },
            target,
            timeout,
            best_effort: true,
        }
    }
}

/// An ordered, immutable sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(PlanStep::kind).collect()
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStepResult {
    pub index: usize,
    pub kind: StepKind,
    pub label: String,
    pub success: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub exit_code: Option<i32>,
    /// Bounded, trimmed tail of stdout.
    pub stdout: String,
    /// Bounded, trimmed tail of stderr.
    pub stderr: String,
    /// Executor-side explanation (timeout, spawn failure, classification).
    pub message: Option<String>,
    /// Probe results for probe and wait steps, in attempt order.
    pub probes: Vec<ProbeResult>,
}

impl PlanStepResult {
    pub(crate) fn new(index: usize, step: &PlanStep) -> Self {
        Self {
            index,
            kind: step.kind(),
            label: step.label.clone(),
            success: false,
            elapsed: Duration::ZERO,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: None,
            probes: Vec::new(),
        }
    }

    /// The final probe of a probe or wait step.
    pub fn probe(&self) -> Option<&ProbeResult> {
        self.probes.last()
    }

    /// Short failure description: message, then stderr (or stdout) excerpt.
    pub fn detail(&self) -> String {
        let output = if self.stderr.is_empty() { &self.stdout } else { &self.stderr };
        match (&self.message, output.is_empty()) {
            (Some(message), true) => message.clone(),
            (Some(message), false) => format!("{}: {}", message, output),
            (None, false) => output.clone(),
            (None, true) => "no output".to_string(),
        }
    }
}

/// Ordered step results of one plan run.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub results: Vec<PlanStepResult>,
    /// True only if every non-best-effort step succeeded.
    pub success: bool,
}

impl PlanOutcome {
    pub fn last_failure(&self) -> Option<&PlanStepResult> {
        self.results.iter().rev().find(|r| !r.success)
    }

    /// The last probe taken anywhere in this run.
    pub fn last_probe(&self) -> Option<&ProbeResult> {
        self.results.iter().rev().find_map(PlanStepResult::probe)
    }

    pub fn ran(&self, kind: StepKind) -> bool {
        self.results.iter().any(|r| r.kind == kind)
    }
}
