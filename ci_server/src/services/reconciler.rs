//! Label and comment reconciliation.
//!
//! Turns a desired label/comment state into the fewest mutating calls needed
//! to reach it. Labels are re-read right before every mutation so repeated
//! webhook deliveries converge instead of duplicating side effects.

use crate::error::RemoteError;
use crate::models::comment_kind::CommentKind;
use crate::models::content::ContentSnapshot;
use crate::models::repo::RepoName;
use crate::services::github_service::CodeHost;

#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    host: &'a dyn CodeHost,
    bot_login: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(host: &'a dyn CodeHost, bot_login: &'a str) -> Self {
        Self { host, bot_login }
    }

    pub fn bot_login(&self) -> &str {
        self.bot_login
    }

    async fn current_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<String>, RemoteError> {
        let labels = self.host.issue_labels(repo, number).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    pub async fn label_exists(&self, repo: &RepoName, number: u64, label: &str) -> Result<bool, RemoteError> {
        Ok(self.current_labels(repo, number).await?.iter().any(|l| l == label))
    }

    /// Add the labels not already on the issue. Nothing is sent when all are present.
    pub async fn add_labels(&self, repo: &RepoName, number: u64, labels: &[&str]) -> Result<(), RemoteError> {
        let current = self.current_labels(repo, number).await?;
        let mut missing: Vec<String> = Vec::new();
        for label in labels {
            if !current.iter().any(|c| c == label) && !missing.iter().any(|m| m == label) {
                missing.push((*label).to_string());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        tracing::debug!(repo = %repo, number, labels = ?missing, "Adding labels");
        self.host.add_labels(repo, number, &missing).await
    }

    /// Remove the labels that are present. A label vanishing in between is fine.
    pub async fn remove_labels(&self, repo: &RepoName, number: u64, labels: &[&str]) -> Result<(), RemoteError> {
        let current = self.current_labels(repo, number).await?;
        for label in labels.iter().filter(|l| current.iter().any(|c| c == *l)) {
            match self.host.remove_label(repo, number, label).await {
                Ok(()) => tracing::debug!(repo = %repo, number, label, "Removed label"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(repo = %repo, number, label, "Label already gone");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Replace `remove` with `add`. A no-op once `add` is present.
    pub async fn toggle_label(&self, repo: &RepoName, number: u64, remove: &str, add: &str) -> Result<(), RemoteError> {
        if self.label_exists(repo, number, add).await? {
            return Ok(());
        }
        self.remove_labels(repo, number, &[remove]).await?;
        self.add_labels(repo, number, &[add]).await
    }

    /// Post `body` unless a bot comment of `kind` already exists. Returns
    /// whether a comment was posted.
    pub async fn add_unique_comment(
        &self,
        repo: &RepoName,
        snapshot: &ContentSnapshot,
        kind: &CommentKind,
        body: &str,
    ) -> Result<bool, RemoteError> {
        if snapshot.already_commented(kind, self.bot_login) {
            return Ok(false);
        }
        self.host.add_comment(repo, snapshot.id(), body).await?;
        tracing::info!(repo = %repo, number = snapshot.id(), marker = %kind.marker(), "Posted comment");
        Ok(true)
    }

    /// Delete the bot comment of `kind`, if there is one.
    pub async fn remove_comment(
        &self,
        repo: &RepoName,
        snapshot: &ContentSnapshot,
        kind: &CommentKind,
    ) -> Result<bool, RemoteError> {
        let Some(comment) = snapshot.find_comment(kind, self.bot_login) else {
            return Ok(false);
        };
        self.host.delete_comment(repo, comment.id).await?;
        tracing::info!(repo = %repo, number = snapshot.id(), id = %comment.id, "Removed comment");
        Ok(true)
    }
}
