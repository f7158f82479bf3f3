//! cutover-metrics: process-scoped request statistics for the demo service.

pub mod stats;

pub use stats::{MEMORY_USAGE_PLACEHOLDER_MB, MetricsSnapshot, RequestStats};
