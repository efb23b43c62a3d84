//! Selection intents, strategies and the final decision record.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::plan::{ExecutionPlan, PlanOutcome, PlanStepResult};
use crate::probe::{Classification, ProbeTarget};

/// What the operator asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Intent {
    /// Reuse if possible, restart once if reuse fails.
    #[default]
    Auto,
    /// Skip reuse entirely.
    ForceRestart,
    /// Reuse or fail; never restart.
    ForceReuse,
}

/// The three plan shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanKind {
    /// Probe (with loading retries) and verify the running instance.
    Reuse,
    /// Stop/start/wait/probe/verify, substituted after a failed reuse.
    Restart,
    /// Stop/start/wait/probe/verify, requested up front.
    ForcedRestart,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Reuse => "reuse",
            PlanKind::Restart => "restart",
            PlanKind::ForcedRestart => "forced-restart",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A built plan plus whether a failure may be answered with a restart plan.
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub kind: PlanKind,
    pub plan: ExecutionPlan,
    pub may_fall_back: bool,
}

/// One executed plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanAttempt {
    pub kind: PlanKind,
    pub plan: ExecutionPlan,
    pub outcome: PlanOutcome,
}

/// Outcome of selecting one backend.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionDecision {
    pub run_id: Uuid,
    pub backend: String,
    /// Strategy of the plan that ran last.
    pub strategy: PlanKind,
    /// True when a failed reuse was replaced by a restart.
    pub fell_back: bool,
    /// Endpoint the final plan targeted.
    pub endpoint: ProbeTarget,
    /// Executed plans in order; one, or two after a fallback.
    pub attempts: Vec<PlanAttempt>,
    /// Classification from the last probe of the final plan.
    pub classification: Classification,
}

impl SelectionDecision {
    pub fn final_attempt(&self) -> Option<&PlanAttempt> {
        self.attempts.last()
    }

    /// Step results of the final plan.
    pub fn results(&self) -> &[PlanStepResult] {
        self.final_attempt()
            .map(|a| a.outcome.results.as_slice())
            .unwrap_or_default()
    }

    /// Usable: the final plan succeeded and the backend answered `ready`.
    pub fn is_ready(&self) -> bool {
        self.final_attempt().is_some_and(|a| a.outcome.success)
            && self.classification == Classification::Ready
    }

    /// The step that sank the final plan, if it failed.
    pub fn failure(&self) -> Option<&PlanStepResult> {
        if self.is_ready() {
            return None;
        }
        self.final_attempt().and_then(|a| a.outcome.last_failure())
    }

    /// Operator-facing description of what happened.
    pub fn summary(&self) -> &'static str {
        match (self.strategy, self.fell_back) {
            (PlanKind::Reuse, _) => "reused",
            (PlanKind::Restart, true) => "restarted after failed reuse",
            (PlanKind::Restart, false) => "restarted",
            (PlanKind::ForcedRestart, _) => "restarted (forced)",
        }
    }
}
