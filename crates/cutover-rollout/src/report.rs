//! Run report — the machine- and human-readable record of one run.

use serde::Serialize;

use cutover_core::ServiceTarget;

use crate::controller::{DeployOutcome, DeployRequest};
use crate::error::{DeployError, OutcomeKind, RollbackStatus, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub service: String,
    pub region: String,
    pub image: Option<String>,
    pub digest: Option<String>,
    pub previous_revision: Option<String>,
    pub revision: Option<String>,
    pub probe_attempts: usize,
    pub outcome: OutcomeKind,
    pub severity: Severity,
    pub message: String,
}

impl RunReport {
    fn base(target: &ServiceTarget, image: Option<String>, outcome: OutcomeKind) -> Self {
        Self {
            service: target.service.clone(),
            region: target.region.clone(),
            image,
            digest: None,
            previous_revision: None,
            revision: None,
            probe_attempts: 0,
            outcome,
            severity: outcome.severity(),
            message: String::new(),
        }
    }

    pub fn from_result(req: &DeployRequest, result: &Result<DeployOutcome, DeployError>) -> Self {
        match result {
            Ok(outcome) => Self::deployed(req, outcome),
            Err(err) => Self::failed(req, err),
        }
    }

    pub fn deployed(req: &DeployRequest, outcome: &DeployOutcome) -> Self {
        let mut report = Self::base(
            &req.target,
            Some(outcome.image.to_string()),
            OutcomeKind::Deployed,
        );
        report.digest = Some(outcome.digest().to_string());
        report.previous_revision = outcome.previous.as_ref().map(ToString::to_string);
        report.revision = Some(outcome.revision.to_string());
        report.probe_attempts = outcome.probe.attempt_count();
        report.message = format!("{} serving {}", outcome.revision, outcome.url);
        report
    }

    pub fn failed(req: &DeployRequest, err: &DeployError) -> Self {
        let mut report = Self::base(&req.target, Some(req.image.to_string()), err.kind());
        report.message = err.to_string();
        match err {
            DeployError::DigestResolution { .. }
            | DeployError::Describe { .. }
            | DeployError::Cancelled => {}
            DeployError::Deploy { digest, .. } => {
                report.digest = Some(digest.to_string());
            }
            DeployError::Promote {
                digest, revision, ..
            } => {
                report.digest = Some(digest.to_string());
                report.revision = Some(revision.to_string());
            }
            DeployError::ProbeFailure {
                digest,
                revision,
                attempts,
                rollback,
                ..
            } => {
                report.digest = Some(digest.to_string());
                report.revision = Some(revision.to_string());
                report.probe_attempts = attempts.len();
                if let RollbackStatus::RolledBack { to } = rollback {
                    report.previous_revision = Some(to.to_string());
                }
            }
            DeployError::RollbackFailure {
                digest,
                revision,
                previous,
                attempts,
                ..
            } => {
                report.digest = Some(digest.to_string());
                report.revision = Some(revision.to_string());
                report.previous_revision = Some(previous.to_string());
                report.probe_attempts = attempts.len();
            }
        }
        report
    }

    pub fn skipped(target: &ServiceTarget, reason: &str) -> Self {
        let mut report = Self::base(target, None, OutcomeKind::Skipped);
        report.message = reason.to_string();
        report
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Markdown block for a CI step summary.
    pub fn to_markdown(&self) -> String {
        let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let mut out = String::new();
        out.push_str(&format!(
            "### Deploy {}: `{}` ({})\n\n",
            self.service, self.outcome, self.severity
        ));
        out.push_str("| | |\n|---|---|\n");
        out.push_str(&format!("| region | {} |\n", self.region));
        out.push_str(&format!("| image | `{}` |\n", dash(&self.image)));
        out.push_str(&format!("| digest | `{}` |\n", dash(&self.digest)));
        out.push_str(&format!("| previous revision | {} |\n", dash(&self.previous_revision)));
        out.push_str(&format!("| new revision | {} |\n", dash(&self.revision)));
        out.push_str(&format!("| probe attempts | {} |\n", self.probe_attempts));
        out.push_str(&format!("\n{}\n", self.message));
        out
    }
}
