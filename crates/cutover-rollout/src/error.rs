//! Failure taxonomy of a deploy run.
//!
//! Every variant is terminal for the run. What matters operationally is
//! whether live traffic ended up on a healthy revision, so a probe failure
//! that was rolled back is reported apart from one that could not be.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use cutover_core::{Digest, RevisionName};
use cutover_health::ProbeResult;

use crate::platform::PlatformError;

/// What happened to traffic after a failed probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RollbackStatus {
    /// All traffic was returned to the revision serving before the deploy.
    RolledBack { to: RevisionName },
    /// Nothing served before this deploy; the unhealthy revision stays live.
    NoPriorRevision,
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RolledBack { to } => write!(f, "traffic returned to {to}"),
            Self::NoPriorRevision => {
                f.write_str("no prior revision to roll back to, unhealthy revision left serving")
            }
        }
    }
}

/// Why the new revision was not verified healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailureCause {
    /// Every probe attempt failed.
    Exhausted,
    /// The run was cancelled while probing.
    Cancelled,
    /// The platform reported no URL for the service after the deploy.
    NoServiceUrl,
}

impl fmt::Display for ProbeFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exhausted => "probe attempts exhausted",
            Self::Cancelled => "cancelled while probing",
            Self::NoServiceUrl => "service URL unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    /// Registry lookup failed. Nothing was changed.
    #[error("could not resolve digest for {image}: {source}")]
    DigestResolution {
        image: String,
        #[source]
        source: PlatformError,
    },

    /// The current state of the service could not be read before the
    /// deploy. Nothing was changed.
    #[error("could not read current state of {service}: {source}")]
    Describe {
        service: String,
        #[source]
        source: PlatformError,
    },

    /// The platform rejected the deploy. Traffic did not move.
    #[error("deploy of {service} rejected: {source}")]
    Deploy {
        service: String,
        digest: Digest,
        #[source]
        source: PlatformError,
    },

    /// The revision was created but traffic stayed pinned elsewhere and
    /// could not be routed to it. It serves nothing and was not probed.
    #[error("revision {revision} created but traffic could not be routed to it: {source}")]
    Promote {
        digest: Digest,
        revision: RevisionName,
        #[source]
        source: PlatformError,
    },

    /// The new revision failed its health check; see `rollback` for where
    /// traffic ended up.
    #[error("revision {revision} unhealthy ({cause}, {} attempt(s)); {rollback}", .attempts.len())]
    ProbeFailure {
        digest: Digest,
        revision: RevisionName,
        cause: ProbeFailureCause,
        attempts: Vec<ProbeResult>,
        rollback: RollbackStatus,
    },

    /// The new revision is unhealthy and traffic could not be returned to
    /// the previous one. Live traffic is on unverified code.
    #[error("revision {revision} unhealthy and traffic could not be returned to {previous}: {source}")]
    RollbackFailure {
        digest: Digest,
        revision: RevisionName,
        previous: RevisionName,
        attempts: Vec<ProbeResult>,
        #[source]
        source: PlatformError,
    },

    /// Cancelled before anything was mutated.
    #[error("run cancelled before deploy, nothing changed")]
    Cancelled,
}

impl DeployError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::DigestResolution { .. } => OutcomeKind::DigestResolutionFailed,
            Self::Describe { .. } | Self::Deploy { .. } | Self::Promote { .. } => {
                OutcomeKind::DeployFailed
            }
            Self::ProbeFailure {
                rollback: RollbackStatus::RolledBack { .. },
                ..
            } => OutcomeKind::ProbeFailedRolledBack,
            Self::ProbeFailure {
                rollback: RollbackStatus::NoPriorRevision,
                ..
            } => OutcomeKind::ProbeFailedNoPriorRevision,
            Self::RollbackFailure { .. } => OutcomeKind::RollbackFailed,
            Self::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }
}

/// Operational severity of a run's outcome, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Skipped,
    /// A failure the procedure recovered from automatically.
    Recovered,
    /// A failure that needs an operator, but live traffic is where it was
    /// or on the only revision there is.
    Failed,
    /// Live traffic is on a revision known to be unhealthy and could not be
    /// moved back.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Recovered => "recovered",
            Self::Failed => "failed",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Deployed,
    Skipped,
    DigestResolutionFailed,
    DeployFailed,
    ProbeFailedRolledBack,
    ProbeFailedNoPriorRevision,
    RollbackFailed,
    Cancelled,
}

impl OutcomeKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::Deployed => Severity::Ok,
            Self::Skipped => Severity::Skipped,
            Self::ProbeFailedRolledBack => Severity::Recovered,
            Self::DigestResolutionFailed
            | Self::DeployFailed
            | Self::ProbeFailedNoPriorRevision
            | Self::Cancelled => Severity::Failed,
            Self::RollbackFailed => Severity::Critical,
        }
    }

    /// Process exit code for the pipeline step.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Deployed | Self::Skipped => 0,
            Self::DigestResolutionFailed => 2,
            Self::DeployFailed => 3,
            Self::ProbeFailedRolledBack => 4,
            Self::ProbeFailedNoPriorRevision => 5,
            Self::RollbackFailed => 6,
            Self::Cancelled => 130,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Skipped => "skipped",
            Self::DigestResolutionFailed => "digest_resolution_failed",
            Self::DeployFailed => "deploy_failed",
            Self::ProbeFailedRolledBack => "probe_failed_rolled_back",
            Self::ProbeFailedNoPriorRevision => "probe_failed_no_prior_revision",
            Self::RollbackFailed => "rollback_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
