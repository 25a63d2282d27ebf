//! GitHub webhook payloads, reduced to the fields the bridge reads.
//!
//! The pull request shape doubles as the response of the "get a pull
//! request" and "list pull requests" API calls.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::models::repo::RepoName;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub owner: User,
    #[serde(default)]
    pub ssh_url: Option<String>,
}

impl Repository {
    pub fn repo_name(&self) -> RepoName {
        RepoName::new(self.owner.login.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// `None` when the head fork has been deleted.
    #[serde(default)]
    pub repo: Option<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub head: GitRef,
    pub base: GitRef,
    /// Number of commits; only present on single-PR payloads.
    #[serde(default)]
    pub commits: u64,
    /// `None` while GitHub is still computing mergeability.
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub user: User,
}

impl PullRequest {
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    /// `owner/name` of the head repository, falling back to the base.
    pub fn head_repo_name(&self) -> String {
        self.head
            .repo
            .as_ref()
            .or(self.base.repo.as_ref())
            .map(|r| r.repo_name().full_name())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronize,
    Closed,
    Edited,
    Labeled,
    Unlabeled,
    #[serde(other)]
    Other,
}

impl PullRequestAction {
    /// Actions that trigger DCO, mergeability and build scheduling.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            PullRequestAction::Opened | PullRequestAction::Reopened | PullRequestAction::Synchronize
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: User,
}

impl PullRequestEvent {
    pub fn parse(body: &[u8]) -> Result<Self, BridgeError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn base_repo(&self) -> RepoName {
        self.pull_request
            .base
            .repo
            .as_ref()
            .unwrap_or(&self.repository)
            .repo_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePullRequestLink {
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    /// Present when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<IssuePullRequestLink>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request
            .as_ref()
            .is_some_and(|pr| !pr.html_url.is_empty())
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: User,
    #[serde(default)]
    pub author_association: String,
}

impl IssueComment {
    pub fn is_from_maintainer(&self) -> bool {
        matches!(
            self.author_association.as_str(),
            "OWNER" | "MEMBER" | "COLLABORATOR"
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Opened,
    Created,
    Edited,
    Closed,
    Reopened,
    #[serde(other)]
    Other,
}

/// Payload of both `issues` and `issue_comment` deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub action: IssueAction,
    pub issue: Issue,
    #[serde(default)]
    pub comment: Option<IssueComment>,
    pub repository: Repository,
    #[serde(default)]
    pub sender: User,
}

impl IssueEvent {
    pub fn parse(body: &[u8]) -> Result<Self, BridgeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCommentEvent {
    #[serde(default)]
    pub action: String,
    pub pull_request: PullRequest,
    pub comment: IssueComment,
    pub repository: Repository,
}

impl ReviewCommentEvent {
    pub fn parse(body: &[u8]) -> Result<Self, BridgeError> {
        Ok(serde_json::from_slice(body)?)
    }
}
