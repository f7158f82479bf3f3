//! Request counter and uptime clock.
//!
//! Lock-free: one atomic counter bumped per request, plus the instant the
//! process started. Shared across handlers behind an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reported in place of a real memory measurement.
pub const MEMORY_USAGE_PLACEHOLDER_MB: u64 = 50;

/// Point-in-time view served on `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub uptime_seconds: f64,
    pub memory_usage_mb: u64,
}

#[derive(Debug)]
pub struct RequestStats {
    request_count: AtomicU64,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Count one request. Returns the new total.
    pub fn record(&self) -> u64 {
        let n = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(request_count = n, "request recorded");
        n
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall-clock start time, for the startup log.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            request_count: self.request_count(),
            uptime_seconds: self.uptime().as_secs_f64(),
            memory_usage_mb: MEMORY_USAGE_PLACEHOLDER_MB,
        }
    }
}
