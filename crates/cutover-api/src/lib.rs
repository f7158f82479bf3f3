//! cutover-api — HTTP surface of the demo service that cutover deploys.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | HTML landing page |
//! | GET | `/health` | Liveness JSON, the target of deploy probes |
//! | GET | `/metrics` | Request count and uptime JSON |
//!
//! Every served request bumps the shared counter, so `/metrics` includes
//! itself in the count it reports.

pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::timeout::TimeoutLayer;

use cutover_metrics::RequestStats;

/// Upper bound on handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Version reported when `APP_VERSION` is unset.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<RequestStats>,
    pub version: Arc<str>,
}

impl AppState {
    pub fn new(version: impl Into<Arc<str>>) -> Self {
        Self {
            stats: Arc::new(RequestStats::new()),
            version: version.into(),
        }
    }
}

/// Build the service router with request logging and the request timeout.
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::landing))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state);
    with_layers(routes, REQUEST_TIMEOUT)
}

/// Requests still running after `timeout` get 408.
fn with_layers(routes: Router, timeout: Duration) -> Router {
    routes
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
}
