//! Jenkins notification handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;

use crate::models::jenkins::JenkinsNotification;
use crate::routes::{error_status, AppState};
use crate::services::notification_service::{self, NotificationOutcome};

/// Handle a build notification posted by the Jenkins notification plugin.
pub async fn handle_jenkins(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, StatusCode> {
    crate::metrics::webhook_received("jenkins", "notification");

    let notification =
        JenkinsNotification::parse(&body).map_err(|e| error_status("jenkins notification", &e))?;

    let outcome = notification_service::handle_notification(
        &state.config,
        state.github.as_ref(),
        state.jenkins.as_ref(),
        &notification,
    )
    .await
    .map_err(|e| error_status("jenkins notification", &e))?;

    Ok(match outcome {
        NotificationOutcome::Ignored => StatusCode::OK,
        NotificationOutcome::Reported(_) => StatusCode::NO_CONTENT,
    })
}
