//! GitHub integration: webhook validation and the code-hosting capability.
//!
//! [`CodeHost`] is the seam the policy engine, reconciler and scheduler are
//! written against; [`GitHubClient`] is its REST implementation.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::BridgeConfig;
use crate::error::{RemoteError, Service};
use crate::models::content::{Comment, CommentId, CommitInfo, FileChange, Label};
use crate::models::hooks::PullRequest;
use crate::models::repo::RepoName;
use crate::models::status::{CommitStatus, StatusRequest};

type HmacSha256 = Hmac<Sha256>;

/// Page size for every list call.
pub const PER_PAGE: u32 = 100;

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        tracing::debug!("Webhook secret not configured, skipping validation");
        return true;
    }

    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// The code-hosting operations the bridge consumes.
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn pull_request(&self, repo: &RepoName, number: u64) -> Result<PullRequest, RemoteError>;

    async fn pull_request_commits(&self, repo: &RepoName, number: u64) -> Result<Vec<CommitInfo>, RemoteError>;

    async fn pull_request_files(&self, repo: &RepoName, number: u64) -> Result<Vec<FileChange>, RemoteError>;

    /// Every comment on the issue or pull request, all pages.
    async fn issue_comments(&self, repo: &RepoName, number: u64) -> Result<Vec<Comment>, RemoteError>;

    async fn add_comment(&self, repo: &RepoName, number: u64, body: &str) -> Result<Comment, RemoteError>;

    async fn edit_comment(&self, repo: &RepoName, id: CommentId, body: &str) -> Result<(), RemoteError>;

    async fn delete_comment(&self, repo: &RepoName, id: CommentId) -> Result<(), RemoteError>;

    async fn issue_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<Label>, RemoteError>;

    async fn add_labels(&self, repo: &RepoName, number: u64, labels: &[String]) -> Result<(), RemoteError>;

    /// Fails with a 404 [`RemoteError`] when the label is not on the issue.
    async fn remove_label(&self, repo: &RepoName, number: u64, label: &str) -> Result<(), RemoteError>;

    async fn statuses(&self, repo: &RepoName, sha: &str) -> Result<Vec<CommitStatus>, RemoteError>;

    async fn set_status(&self, repo: &RepoName, sha: &str, status: &StatusRequest) -> Result<(), RemoteError>;

    async fn open_pull_requests(&self, repo: &RepoName) -> Result<Vec<PullRequest>, RemoteError>;
}

// ── REST client ──

#[derive(Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiFile {
    filename: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct ApiUser {
    #[serde(default)]
    login: String,
}

#[derive(Deserialize)]
struct ApiComment {
    id: u64,
    #[serde(default)]
    body: String,
    user: ApiUser,
}

impl From<ApiComment> for Comment {
    fn from(c: ApiComment) -> Self {
        Comment::new(c.id, c.user.login, c.body)
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(&config.github_api_url, &config.github_token)
    }

    fn repo_url(&self, repo: &RepoName, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_url, repo.owner(), repo.name(), path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "ci-bridge");

        if self.token.is_empty() {
            builder
        } else {
            builder.header(AUTHORIZATION, format!("Bearer {}", self.token))
        }
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response, RemoteError> {
        let resp = builder.send().await.map_err(|e| {
            crate::metrics::remote_error(Service::GitHub.as_str());
            RemoteError::from_reqwest(Service::GitHub, url, e)
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            crate::metrics::remote_error(Service::GitHub.as_str());
            return Err(RemoteError::new(Service::GitHub, url, format!("{status} {text}"))
                .with_status(status.as_u16()));
        }

        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        let resp = self.send(self.request(Method::GET, url), url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| RemoteError::from_reqwest(Service::GitHub, url, e))
    }

    /// GET every page of a list endpoint, following `Link: rel="next"`.
    async fn get_paginated<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, RemoteError> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let mut next = Some(format!("{url}{separator}per_page={PER_PAGE}"));
        let mut items = Vec::new();

        while let Some(page_url) = next.take() {
            let resp = self.send(self.request(Method::GET, &page_url), &page_url).await?;
            next = next_page(resp.headers());
            let page: Vec<T> = resp
                .json()
                .await
                .map_err(|e| RemoteError::from_reqwest(Service::GitHub, &page_url, e))?;
            items.extend(page);
        }

        Ok(items)
    }
}

/// Extract the `rel="next"` target from a GitHub `Link` header.
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn pull_request(&self, repo: &RepoName, number: u64) -> Result<PullRequest, RemoteError> {
        self.get_json(&self.repo_url(repo, &format!("/pulls/{number}")))
            .await
    }

    async fn pull_request_commits(&self, repo: &RepoName, number: u64) -> Result<Vec<CommitInfo>, RemoteError> {
        let commits: Vec<ApiCommit> = self
            .get_paginated(&self.repo_url(repo, &format!("/pulls/{number}/commits")))
            .await?;
        Ok(commits
            .into_iter()
            .map(|c| CommitInfo::new(c.sha, c.commit.message))
            .collect())
    }

    async fn pull_request_files(&self, repo: &RepoName, number: u64) -> Result<Vec<FileChange>, RemoteError> {
        let files: Vec<ApiFile> = self
            .get_paginated(&self.repo_url(repo, &format!("/pulls/{number}/files")))
            .await?;
        Ok(files
            .into_iter()
            .map(|f| FileChange {
                path: f.filename,
                status: f.status,
            })
            .collect())
    }

    async fn issue_comments(&self, repo: &RepoName, number: u64) -> Result<Vec<Comment>, RemoteError> {
        let comments: Vec<ApiComment> = self
            .get_paginated(&self.repo_url(repo, &format!("/issues/{number}/comments")))
            .await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn add_comment(&self, repo: &RepoName, number: u64, body: &str) -> Result<Comment, RemoteError> {
        let url = self.repo_url(repo, &format!("/issues/{number}/comments"));
        let builder = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "body": body }));
        let resp = self.send(builder, &url).await?;
        let comment: ApiComment = resp
            .json()
            .await
            .map_err(|e| RemoteError::from_reqwest(Service::GitHub, &url, e))?;
        Ok(comment.into())
    }

    async fn edit_comment(&self, repo: &RepoName, id: CommentId, body: &str) -> Result<(), RemoteError> {
        let url = self.repo_url(repo, &format!("/issues/comments/{id}"));
        let builder = self
            .request(Method::PATCH, &url)
            .json(&serde_json::json!({ "body": body }));
        self.send(builder, &url).await?;
        Ok(())
    }

    async fn delete_comment(&self, repo: &RepoName, id: CommentId) -> Result<(), RemoteError> {
        let url = self.repo_url(repo, &format!("/issues/comments/{id}"));
        self.send(self.request(Method::DELETE, &url), &url).await?;
        Ok(())
    }

    async fn issue_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<Label>, RemoteError> {
        self.get_paginated(&self.repo_url(repo, &format!("/issues/{number}/labels")))
            .await
    }

    async fn add_labels(&self, repo: &RepoName, number: u64, labels: &[String]) -> Result<(), RemoteError> {
        let url = self.repo_url(repo, &format!("/issues/{number}/labels"));
        let builder = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "labels": labels }));
        self.send(builder, &url).await?;
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoName, number: u64, label: &str) -> Result<(), RemoteError> {
        let base = self.repo_url(repo, &format!("/issues/{number}/labels"));
        // Label names such as "dco/no" must be a single encoded path segment.
        let mut url = Url::parse(&base)
            .map_err(|e| RemoteError::new(Service::GitHub, base.as_str(), e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::new(Service::GitHub, base.as_str(), "url cannot be a base"))?
            .push(label);

        let url = url.to_string();
        self.send(self.request(Method::DELETE, &url), &url).await?;
        Ok(())
    }

    async fn statuses(&self, repo: &RepoName, sha: &str) -> Result<Vec<CommitStatus>, RemoteError> {
        self.get_paginated(&self.repo_url(repo, &format!("/commits/{sha}/statuses")))
            .await
    }

    async fn set_status(&self, repo: &RepoName, sha: &str, status: &StatusRequest) -> Result<(), RemoteError> {
        let url = self.repo_url(repo, &format!("/statuses/{sha}"));
        let builder = self.request(Method::POST, &url).json(status);
        self.send(builder, &url).await?;
        Ok(())
    }

    async fn open_pull_requests(&self, repo: &RepoName) -> Result<Vec<PullRequest>, RemoteError> {
        self.get_paginated(&self.repo_url(repo, "/pulls?state=open"))
            .await
    }
}
