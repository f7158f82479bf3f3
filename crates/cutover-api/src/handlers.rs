//! Route handlers. Each one counts itself before answering.

use axum::Json;
use axum::extract::State;
use axum::response::Html;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use cutover_metrics::MetricsSnapshot;

use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub version: String,
}

const LANDING: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>cutover demo service</title>
</head>
<body>
  <h1>cutover demo service</h1>
  <p>A minimal service used to exercise deploy verification and rollback.</p>
  <ul>
    <li><a href="/health">/health</a>: liveness and version</li>
    <li><a href="/metrics">/metrics</a>: request count and uptime</li>
  </ul>
</body>
</html>
"#;

/// GET /
pub async fn landing(State(state): State<AppState>) -> Html<&'static str> {
    state.stats.record();
    Html(LANDING)
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    state.stats.record();
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        version: state.version.to_string(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    state.stats.record();
    Json(state.stats.snapshot())
}
