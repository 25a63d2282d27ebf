//! Manual build API: retry, custom and cron-driven rebuilds.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

use crate::config::{Build, BridgeConfig};
use crate::error::BridgeError;
use crate::models::repo::RepoName;
use crate::routes::{error_status, AppState};
use crate::services::scheduler::Scheduler;

/// Request body shared by the manual build endpoints.
#[derive(Debug, Deserialize)]
pub struct BuildRequest {
    #[serde(default)]
    pub number: u64,
    pub repo: String,
    /// `""` or `"all"` selects every non-custom build of the repo.
    #[serde(default)]
    pub context: String,
}

impl BuildRequest {
    fn parse(body: &[u8]) -> Result<(Self, RepoName), BridgeError> {
        let request: Self = serde_json::from_slice(body)?;
        let repo = request
            .repo
            .parse::<RepoName>()
            .map_err(|_| BridgeError::malformed(format!("invalid repo name: {}", request.repo)))?;
        Ok((request, repo))
    }
}

/// Decode `Authorization: Basic ...` into (user, pass).
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Both user and password must match; unset credentials lock the endpoints.
fn check_auth(config: &BridgeConfig, headers: &HeaderMap) -> Result<(), StatusCode> {
    if config.user.is_empty() || config.pass.is_empty() {
        tracing::warn!("Manual build credentials not configured, rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    match basic_credentials(headers) {
        Some((user, pass)) if user == config.user && pass == config.pass => Ok(()),
        _ => {
            tracing::warn!("Manual build request with invalid credentials");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// `/build/retry` and `/build/custom`.
pub async fn custom_build(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    check_auth(&state.config, &headers)?;
    let (request, repo) = BuildRequest::parse(&body).map_err(|e| error_status("build request", &e))?;

    let selected = if request.context.is_empty() || request.context == "all" {
        state.config.builds_for_repo(&repo, false)
    } else {
        state
            .config
            .build_by_context_and_repo(&request.context, &repo)
            .map(|b| vec![b])
    };
    let builds: Vec<&Build> = selected.map_err(|e| error_status("build request", &e))?;

    tracing::info!(repo = %repo, pr = request.number, context = %request.context, builds = builds.len(), "Manual build requested");

    Scheduler::new(&state.config, state.github.as_ref(), state.jenkins.as_ref())
        .schedule_builds(&repo, request.number, &builds)
        .await
        .map_err(|e| error_status("build request", &e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// `/build/cron`: rebuild open pull requests without a successful status.
pub async fn cron_build(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    check_auth(&state.config, &headers)?;
    let (request, repo) = BuildRequest::parse(&body).map_err(|e| error_status("cron request", &e))?;

    let build = state
        .config
        .build_by_context_and_repo(&request.context, &repo)
        .map_err(|e| error_status("cron request", &e))?;

    let scheduler = Scheduler::new(&state.config, state.github.as_ref(), state.jenkins.as_ref());
    let numbers = scheduler
        .failed_prs(&repo, &build.context)
        .await
        .map_err(|e| error_status("cron request", &BridgeError::from(e)))?;

    tracing::info!(repo = %repo, context = %build.context, prs = ?numbers, "Rescheduling builds");

    for number in numbers {
        if let Err(e) = scheduler.schedule(&repo, number, build).await {
            tracing::error!(repo = %repo, pr = number, error = %e, "Rescheduling build failed");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
