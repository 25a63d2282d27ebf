//! Commit status reporting.

use crate::error::RemoteError;
use crate::models::repo::RepoName;
use crate::models::status::{StatusRequest, StatusState};
use crate::services::github_service::CodeHost;

#[derive(Clone, Copy)]
pub struct StatusReporter<'a> {
    host: &'a dyn CodeHost,
}

impl<'a> StatusReporter<'a> {
    pub fn new(host: &'a dyn CodeHost) -> Self {
        Self { host }
    }

    pub async fn set(
        &self,
        repo: &RepoName,
        sha: &str,
        state: StatusState,
        context: &str,
        description: &str,
        target_url: Option<&str>,
    ) -> Result<(), RemoteError> {
        let request = StatusRequest {
            state,
            description: description.to_string(),
            target_url: target_url.filter(|u| !u.is_empty()).map(str::to_string),
            context: context.to_string(),
        };
        self.host.set_status(repo, sha, &request).await?;

        crate::metrics::status_set(state.as_str());
        tracing::info!(
            repo = %repo,
            sha,
            context,
            state = state.as_str(),
            "Set commit status"
        );
        Ok(())
    }

    pub async fn pending(
        &self,
        repo: &RepoName,
        sha: &str,
        context: &str,
        description: &str,
        target_url: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.set(repo, sha, StatusState::Pending, context, description, target_url)
            .await
    }

    pub async fn success(
        &self,
        repo: &RepoName,
        sha: &str,
        context: &str,
        description: &str,
        target_url: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.set(repo, sha, StatusState::Success, context, description, target_url)
            .await
    }

    pub async fn failure(
        &self,
        repo: &RepoName,
        sha: &str,
        context: &str,
        description: &str,
        target_url: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.set(repo, sha, StatusState::Failure, context, description, target_url)
            .await
    }
}
