//! cutover-rollout — deploy a digest-pinned image and revert traffic if it is unhealthy.
//!
//! The procedure is a short, strictly ordered control script around a
//! [`Platform`]: pin the image to its digest, record the serving revision,
//! deploy, probe, and on failure send all traffic back to the recorded
//! revision.
//!
//! # Components
//!
//! - **`platform`** — the `Platform` trait every external effect goes through
//! - **`controller`** — the deploy-and-rollback procedure
//! - **`error`** — failure taxonomy, severity, exit codes
//! - **`gate`** — upstream workflow gating (trunk + success only)
//! - **`lock`** — per-service serialization of runs
//! - **`report`** — JSON / markdown run report

pub mod controller;
pub mod error;
pub mod gate;
pub mod lock;
pub mod platform;
pub mod report;

pub use controller::{Controller, DeployOutcome, DeployRequest};
pub use error::{DeployError, OutcomeKind, ProbeFailureCause, RollbackStatus, Severity};
pub use gate::{Gate, GateDecision, WorkflowEvent, WorkflowRun};
pub use lock::DeployLocks;
pub use platform::{Platform, PlatformError, PlatformErrorKind, PlatformFuture};
pub use report::RunReport;
