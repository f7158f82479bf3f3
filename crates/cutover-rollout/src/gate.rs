//! Trigger gate — decides whether a publish run should lead to a deploy.
//!
//! The deploy runs only after the upstream publish run concluded with the
//! required result on the trunk branch. Anything else is a no-op, not a
//! failure.

use serde::Deserialize;
use tracing::{debug, info};

use cutover_core::GateConfig;

/// The subset of a GitHub `workflow_run` event payload the gate reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowEvent {
    pub workflow_run: Option<WorkflowRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRun {
    pub name: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: Option<String>,
}

impl WorkflowEvent {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Whether to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Deploy. Carries the commit the publish run built, when known.
    Run { head_sha: Option<String> },
    Skip { reason: String },
}

impl GateDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, GateDecision::Run { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Gate {
    trunk: String,
    conclusion: String,
    allow_manual: bool,
}

impl Gate {
    pub fn new(trunk: impl Into<String>, conclusion: impl Into<String>) -> Self {
        Self {
            trunk: trunk.into(),
            conclusion: conclusion.into(),
            allow_manual: false,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.trunk, &config.conclusion)
    }

    /// Let events without a `workflow_run` (manual dispatch) through.
    pub fn allow_manual(mut self, allow: bool) -> Self {
        self.allow_manual = allow;
        self
    }

    pub fn evaluate(&self, event: &WorkflowEvent) -> GateDecision {
        let Some(run) = &event.workflow_run else {
            if self.allow_manual {
                info!("no upstream workflow run, manual trigger allowed");
                return GateDecision::Run { head_sha: None };
            }
            return skip("event has no upstream workflow run".to_string());
        };

        let conclusion = run.conclusion.as_deref().unwrap_or("<pending>");
        if conclusion != self.conclusion {
            return skip(format!(
                "upstream run concluded {conclusion}, need {}",
                self.conclusion
            ));
        }

        let branch = run.head_branch.as_deref().unwrap_or("<none>");
        if branch != self.trunk {
            return skip(format!("upstream run is on {branch}, not {}", self.trunk));
        }

        info!(
            workflow = run.name.as_deref().unwrap_or("<unnamed>"),
            %branch,
            sha = run.head_sha.as_deref().unwrap_or("<unknown>"),
            "gate passed"
        );
        GateDecision::Run {
            head_sha: run.head_sha.clone(),
        }
    }
}

fn skip(reason: String) -> GateDecision {
    debug!(%reason, "gate closed");
    GateDecision::Skip { reason }
}
