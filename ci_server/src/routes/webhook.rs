//! GitHub webhook handler: pull request, issue and review comment events.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::models::hooks::{IssueEvent, PullRequestEvent, ReviewCommentEvent};
use crate::routes::{error_status, AppState};
use crate::services::github_service;
use crate::services::issue_service::{self, IssueOutcome};
use crate::services::policy::{self, PullRequestOutcome};

/// Handle an incoming GitHub webhook payload.
pub async fn handle_github(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    // Validate signature
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !github_service::validate_signature(&state.config.webhook_secret, &body, signature) {
        tracing::warn!("Webhook signature validation failed");
        return Err(StatusCode::UNAUTHORIZED);
    }

    // Parse event type
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let label = if event_type.is_empty() { "unknown" } else { event_type };
    crate::metrics::webhook_received("github", label);

    match event_type {
        "" => {
            tracing::error!("Got GitHub notification without a type");
            Err(StatusCode::BAD_REQUEST)
        }
        "ping" => {
            tracing::info!("Received GitHub ping webhook");
            Ok(StatusCode::OK)
        }
        "issues" | "issue_comment" => handle_issue(&state, &body).await,
        "pull_request" => handle_pull_request(&state, &body).await,
        "pull_request_review_comment" => handle_review_comment(&state, &body).await,
        _ => {
            tracing::debug!("Ignoring webhook event: {}", event_type);
            Ok(StatusCode::OK)
        }
    }
}

async fn handle_pull_request(state: &AppState, body: &[u8]) -> Result<StatusCode, StatusCode> {
    let event = PullRequestEvent::parse(body).map_err(|e| error_status("pull request hook", &e))?;

    let outcome = policy::handle_pull_request(
        &state.config,
        state.github.as_ref(),
        state.jenkins.as_ref(),
        &event,
    )
    .await
    .map_err(|e| error_status("pull request hook", &e))?;

    tracing::debug!(pr = event.number, ?outcome, "Pull request handled");
    match outcome {
        PullRequestOutcome::Ignored => Ok(StatusCode::NO_CONTENT),
        PullRequestOutcome::DcoRejected
        | PullRequestOutcome::Unmergeable
        | PullRequestOutcome::Scheduled { .. } => Ok(StatusCode::OK),
    }
}

async fn handle_issue(state: &AppState, body: &[u8]) -> Result<StatusCode, StatusCode> {
    let event = IssueEvent::parse(body).map_err(|e| error_status("issue hook", &e))?;

    let outcome = issue_service::handle_issue_event(&state.config, state.github.as_ref(), &event)
        .await
        .map_err(|e| error_status("issue hook", &e))?;

    Ok(match outcome {
        IssueOutcome::Handled => StatusCode::NO_CONTENT,
        IssueOutcome::Skipped | IssueOutcome::Ignored => StatusCode::OK,
    })
}

async fn handle_review_comment(state: &AppState, body: &[u8]) -> Result<StatusCode, StatusCode> {
    let event = ReviewCommentEvent::parse(body).map_err(|e| error_status("review comment hook", &e))?;

    let outcome = issue_service::handle_review_comment(&state.config, state.github.as_ref(), &event)
        .await
        .map_err(|e| error_status("review comment hook", &e))?;

    Ok(match outcome {
        IssueOutcome::Handled => StatusCode::NO_CONTENT,
        IssueOutcome::Skipped | IssueOutcome::Ignored => StatusCode::OK,
    })
}
