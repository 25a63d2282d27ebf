//! Jenkins build notifications: mirror the build state onto the commit and,
//! optionally, comment with the failing part of the log.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::models::comment_kind::CommentKind;
use crate::models::jenkins::{BuildPhase, JenkinsNotification};
use crate::models::repo::RepoName;
use crate::models::status::StatusState;
use crate::services::content_service;
use crate::services::github_service::CodeHost;
use crate::services::jenkins_service::{failed_build_comment, BuildTrigger};
use crate::services::reconciler::Reconciler;
use crate::services::status_service::StatusReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Queued and finalized phases carry nothing to report.
    Ignored,
    Reported(StatusState),
}

/// Commit status and description for a notification, `None` for phases
/// that are not reported. An unknown completion status is malformed.
pub fn build_state(notification: &JenkinsNotification) -> Result<Option<(StatusState, String)>, BridgeError> {
    let build = &notification.build;
    let prefix = format!("Jenkins build {} {}", notification.name, build.number);

    let (state, outcome) = match build.phase {
        BuildPhase::Started => (StatusState::Pending, "is running"),
        BuildPhase::Completed => match build.status.as_deref().unwrap_or_default() {
            "SUCCESS" => (StatusState::Success, "has succeeded"),
            "FAILURE" => (StatusState::Failure, "has failed"),
            "UNSTABLE" => (StatusState::Failure, "was unstable"),
            "ABORTED" => (StatusState::Error, "has encountered an error"),
            other => {
                return Err(BridgeError::malformed(format!(
                    "did not understand {other:?} build status"
                )));
            }
        },
        _ => return Ok(None),
    };

    Ok(Some((state, format!("{prefix} {outcome}"))))
}

pub async fn handle_notification(
    config: &BridgeConfig,
    host: &dyn CodeHost,
    jenkins: &dyn BuildTrigger,
    notification: &JenkinsNotification,
) -> Result<NotificationOutcome, BridgeError> {
    let build = &notification.build;
    tracing::info!(
        job = %notification.name,
        number = build.number,
        url = %build.url,
        phase = ?build.phase,
        "Received Jenkins notification"
    );

    let Some((state, description)) = build_state(notification)? else {
        return Ok(NotificationOutcome::Ignored);
    };

    let configured = config.build_by_job(&notification.name)?;
    let repo: RepoName = build.parameters.git_base_repo.parse()?;
    let console_url = format!("{}console", build.url);

    StatusReporter::new(host)
        .set(
            &repo,
            &build.parameters.git_sha,
            state,
            &configured.context,
            &description,
            Some(&console_url),
        )
        .await?;

    if config.comment_on_failure && matches!(state, StatusState::Failure | StatusState::Success) {
        let Ok(number) = build.parameters.pr.parse::<u64>() else {
            tracing::warn!(job = %notification.name, pr = %build.parameters.pr, "Notification without a PR number");
            return Ok(NotificationOutcome::Reported(state));
        };

        let kind = CommentKind::FailedJob(notification.name.clone());
        let snapshot = content_service::fetch(host, &repo, number, false).await?;
        let reconciler = Reconciler::new(host, &config.github_user);

        if state == StatusState::Failure {
            let log = jenkins.build_log(&notification.name, build.number).await?;
            if let Some(comment) = failed_build_comment(&notification.name, &console_url, &log) {
                reconciler.add_unique_comment(&repo, &snapshot, &kind, &comment).await?;
            }
        } else {
            reconciler.remove_comment(&repo, &snapshot, &kind).await?;
        }
    }

    Ok(NotificationOutcome::Reported(state))
}
