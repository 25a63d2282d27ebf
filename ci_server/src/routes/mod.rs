//! Bridge HTTP routes: GitHub and Jenkins notifications, manual build API.

pub mod api;
pub mod jenkins;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::services::github_service::CodeHost;
use crate::services::jenkins_service::BuildTrigger;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub github: Arc<dyn CodeHost>,
    pub jenkins: Arc<dyn BuildTrigger>,
}

/// Build the bridge's Axum router. Each request is bounded by `request_timeout`.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/ping", get(ping))
        // Notifications
        .route("/notification/github", post(webhook::handle_github))
        .route("/notification/jenkins", post(jenkins::handle_jenkins))
        // Manual builds
        .route("/build/retry", post(api::custom_build))
        .route("/build/custom", post(api::custom_build))
        .route("/build/cron", post(api::cron_build))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}

/// Log `err` and pick the response status for it.
pub(crate) fn error_status(context: &str, err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::MalformedPayload(_) => {
            tracing::warn!(error = %err, "{context}: rejected payload");
            StatusCode::BAD_REQUEST
        }
        BridgeError::Configuration(_) => {
            tracing::warn!(error = %err, "{context}: configuration error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        BridgeError::Remote(_) | BridgeError::RemoteBatch(_) => {
            tracing::error!(error = %err, "{context}: remote call failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
