//! cutover-gcloud: the Cloud Run / Artifact Registry [`Platform`].
//!
//! Every operation shells out to `gcloud` with `--format=json` and maps the
//! answer onto core types. Process spawning sits behind [`CommandRunner`]
//! so the mapping can be tested without the CLI installed.
//!
//! [`Platform`]: cutover_rollout::Platform

pub mod gcloud;
pub mod runner;

pub use gcloud::{GCLOUD_ENV, GcloudPlatform, classify_stderr, find_gcloud};
pub use runner::{CommandRunner, RunFuture, SystemRunner, ToolOutput};
