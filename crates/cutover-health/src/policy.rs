//! Bounded probe retries.
//!
//! A freshly deployed revision may need a few seconds to start. The
//! policy gives it a small, fixed number of attempts with a short timeout
//! each and a fixed pause in between, then gives up.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use cutover_core::{CoreError, CoreResult, ProbeConfig};

use crate::cancel::{cancelled, is_cancelled};
use crate::checker::{ProbeResult, http_probe};

/// How many times to probe, how long to wait for each answer, and how long
/// to pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub timeout: Duration,
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl ProbePolicy {
    pub fn new(timeout: Duration, attempts: u32, delay: Duration) -> CoreResult<Self> {
        if attempts == 0 {
            return Err(CoreError::InvalidPolicy(
                "probe attempts must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(CoreError::InvalidPolicy(
                "probe timeout must be positive".to_string(),
            ));
        }
        Ok(Self {
            timeout,
            attempts,
            delay,
        })
    }

    pub fn from_config(config: &ProbeConfig) -> CoreResult<Self> {
        Self::new(config.timeout()?, config.attempts, config.delay()?)
    }
}

/// Every attempt of a probe run, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub attempts: Vec<ProbeResult>,
    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl ProbeReport {
    /// True if the last attempt succeeded.
    pub fn healthy(&self) -> bool {
        self.attempts.last().is_some_and(|r| r.is_healthy())
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Probe `url` until it answers 2xx or the policy's attempts run out.
///
/// Cancellation stops further attempts; the attempts made so far are kept
/// and the report is marked cancelled.
pub async fn probe_until_healthy(
    client: &reqwest::Client,
    url: &str,
    policy: &ProbePolicy,
    cancel: &mut watch::Receiver<bool>,
) -> ProbeReport {
    let mut report = ProbeReport::default();

    for attempt in 1..=policy.attempts {
        if is_cancelled(cancel) {
            report.cancelled = true;
            break;
        }

        let result = http_probe(client, url, policy.timeout).await;
        report.attempts.push(result);

        if result.is_healthy() {
            info!(%url, attempt, "health probe passed");
            return report;
        }
        warn!(%url, attempt, of = policy.attempts, ?result, "health probe attempt failed");

        if attempt < policy.attempts {
            debug!(delay = ?policy.delay, "waiting before next probe");
            tokio::select! {
                _ = tokio::time::sleep(policy.delay) => {}
                _ = cancelled(cancel) => {
                    report.cancelled = true;
                    break;
                }
            }
        }
    }

    if report.cancelled {
        warn!(%url, attempts = report.attempt_count(), "health probing cancelled");
    }
    report
}
