//! cutover-health — deciding whether a freshly deployed revision serves.
//!
//! A probe is one HTTP GET against the revision's health endpoint. A
//! probe run repeats it a fixed number of times with a fixed delay in
//! between, absorbing cold-start latency without blocking the pipeline
//! for long.
//!
//! # Architecture
//!
//! ```text
//! probe_until_healthy(policy)
//!   ├── http_probe() → ProbeResult   (per attempt, explicit timeout)
//!   ├── sleep(policy.delay)          (between attempts)
//!   └── ProbeReport                  (every attempt, cancelled flag)
//! ```

pub mod cancel;
pub mod checker;
pub mod policy;

pub use cancel::{cancel_on, cancelled, is_cancelled, shutdown_signal};
pub use checker::{ProbeResult, http_probe, join_url, probe_client};
pub use policy::{ProbePolicy, ProbeReport, probe_until_healthy};
