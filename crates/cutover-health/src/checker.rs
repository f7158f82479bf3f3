//! Health check probe logic.
//!
//! Performs a single HTTP GET against a health endpoint with an explicit
//! timeout and classifies the outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum ProbeResult {
    /// The health endpoint returned 2xx.
    Healthy,
    /// The health endpoint answered with a non-2xx status.
    Unhealthy(u16),
    /// The probe could not complete (connection error or timeout).
    Failed,
}

impl ProbeResult {
    pub fn is_healthy(self) -> bool {
        self == ProbeResult::Healthy
    }
}

/// Build the HTTP client used for probes.
pub fn probe_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cutover-health/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Join a service base URL and a health path.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Perform an HTTP health probe against a URL.
///
/// Returns `Healthy` if the response is 2xx, `Unhealthy` for non-2xx,
/// or `Failed` if the connection fails or times out.
pub async fn http_probe(client: &reqwest::Client, url: &str, timeout: Duration) -> ProbeResult {
    let result = tokio::time::timeout(timeout, async {
        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    ProbeResult::Healthy
                } else {
                    debug!(%status, %url, "health probe non-2xx");
                    ProbeResult::Unhealthy(status.as_u16())
                }
            }
            Err(e) => {
                debug!(error = %e, %url, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%url, "health probe timed out");
            ProbeResult::Failed
        }
    }
}
