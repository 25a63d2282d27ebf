//! In-memory fakes for the remote capabilities (testing only)
//!
//! `FakeCodeHost` keeps pull requests, comments, labels and statuses in
//! memory and records every mutating call; `FakeJenkins` records triggered
//! and cancelled builds.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RemoteError, Service};
use crate::models::content::{Comment, CommentId, CommitInfo, FileChange, Label};
use crate::models::hooks::PullRequest;
use crate::models::jenkins::{QueuedBuild, RecentBuild};
use crate::models::repo::RepoName;
use crate::models::status::{CommitStatus, StatusRequest};
use crate::services::github_service::CodeHost;
use crate::services::jenkins_service::BuildTrigger;

type IssueKey = (String, u64);

fn issue_key(repo: &RepoName, number: u64) -> IssueKey {
    (repo.full_name(), number)
}

// ---------------------------------------------------------------------------
// FakeCodeHost
// ---------------------------------------------------------------------------

/// A mutating call received by [`FakeCodeHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddComment { number: u64, body: String },
    EditComment { id: CommentId, body: String },
    DeleteComment { id: CommentId },
    AddLabels { number: u64, labels: Vec<String> },
    RemoveLabel { number: u64, label: String },
    SetStatus { sha: String, status: StatusRequest },
}

#[derive(Debug, Default)]
struct HostState {
    pull_requests: HashMap<IssueKey, PullRequest>,
    commits: HashMap<IssueKey, Vec<CommitInfo>>,
    files: HashMap<IssueKey, Vec<FileChange>>,
    comments: HashMap<IssueKey, Vec<Comment>>,
    labels: HashMap<IssueKey, Vec<String>>,
    statuses: HashMap<(String, String), Vec<CommitStatus>>,
    next_comment_id: u64,
    mutations: Vec<Mutation>,
    failing: HashSet<&'static str>,
}

#[derive(Debug, Default)]
pub struct FakeCodeHost {
    bot_login: String,
    state: Mutex<HostState>,
}

impl FakeCodeHost {
    /// Comments added through the trait are authored by `bot_login`.
    pub fn new(bot_login: impl Into<String>) -> Self {
        Self {
            bot_login: bot_login.into(),
            state: Mutex::new(HostState {
                next_comment_id: 1000,
                ..HostState::default()
            }),
        }
    }

    pub fn insert_pull_request(&self, repo: &RepoName, pr: PullRequest) {
        let mut state = self.state.lock().unwrap();
        state.pull_requests.insert(issue_key(repo, pr.number), pr);
    }

    pub fn set_commits(&self, repo: &RepoName, number: u64, commits: Vec<CommitInfo>) {
        self.state.lock().unwrap().commits.insert(issue_key(repo, number), commits);
    }

    pub fn set_files(&self, repo: &RepoName, number: u64, paths: &[&str]) {
        let files = paths.iter().map(|p| FileChange::new(*p)).collect();
        self.state.lock().unwrap().files.insert(issue_key(repo, number), files);
    }

    pub fn set_labels(&self, repo: &RepoName, number: u64, labels: &[&str]) {
        let labels = labels.iter().map(|l| l.to_string()).collect();
        self.state.lock().unwrap().labels.insert(issue_key(repo, number), labels);
    }

    /// Seed a comment as if `author` had posted it.
    pub fn push_comment(&self, repo: &RepoName, number: u64, author: &str, body: &str) -> CommentId {
        let mut state = self.state.lock().unwrap();
        state.next_comment_id += 1;
        let comment = Comment::new(state.next_comment_id, author, body);
        let id = comment.id;
        state.comments.entry(issue_key(repo, number)).or_default().push(comment);
        id
    }

    pub fn push_status(&self, repo: &RepoName, sha: &str, status: CommitStatus) {
        let mut state = self.state.lock().unwrap();
        state
            .statuses
            .entry((repo.full_name(), sha.to_string()))
            .or_default()
            .insert(0, status);
    }

    /// Make every call of the named trait method fail with a 500.
    pub fn fail_on(&self, method: &'static str) {
        self.state.lock().unwrap().failing.insert(method);
    }

    pub fn labels(&self, repo: &RepoName, number: u64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.labels.get(&issue_key(repo, number)).cloned().unwrap_or_default()
    }

    pub fn comments(&self, repo: &RepoName, number: u64) -> Vec<Comment> {
        let state = self.state.lock().unwrap();
        state.comments.get(&issue_key(repo, number)).cloned().unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    /// Statuses set through the trait, in call order.
    pub fn statuses_set(&self) -> Vec<(String, StatusRequest)> {
        self.mutations()
            .into_iter()
            .filter_map(|m| match m {
                Mutation::SetStatus { sha, status } => Some((sha, status)),
                _ => None,
            })
            .collect()
    }

    fn check(&self, state: &HostState, method: &'static str, url: String) -> Result<(), RemoteError> {
        if state.failing.contains(method) {
            return Err(RemoteError::new(Service::GitHub, url, "injected failure").with_status(500));
        }
        Ok(())
    }

    fn not_found(url: String) -> RemoteError {
        RemoteError::new(Service::GitHub, url, "Not Found").with_status(404)
    }
}

#[async_trait]
impl CodeHost for FakeCodeHost {
    async fn pull_request(&self, repo: &RepoName, number: u64) -> Result<PullRequest, RemoteError> {
        let state = self.state.lock().unwrap();
        let url = format!("/repos/{repo}/pulls/{number}");
        self.check(&state, "pull_request", url.clone())?;
        state
            .pull_requests
            .get(&issue_key(repo, number))
            .cloned()
            .ok_or_else(|| Self::not_found(url))
    }

    async fn pull_request_commits(&self, repo: &RepoName, number: u64) -> Result<Vec<CommitInfo>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "pull_request_commits", format!("/repos/{repo}/pulls/{number}/commits"))?;
        Ok(state.commits.get(&issue_key(repo, number)).cloned().unwrap_or_default())
    }

    async fn pull_request_files(&self, repo: &RepoName, number: u64) -> Result<Vec<FileChange>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "pull_request_files", format!("/repos/{repo}/pulls/{number}/files"))?;
        Ok(state.files.get(&issue_key(repo, number)).cloned().unwrap_or_default())
    }

    async fn issue_comments(&self, repo: &RepoName, number: u64) -> Result<Vec<Comment>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "issue_comments", format!("/repos/{repo}/issues/{number}/comments"))?;
        Ok(state.comments.get(&issue_key(repo, number)).cloned().unwrap_or_default())
    }

    async fn add_comment(&self, repo: &RepoName, number: u64, body: &str) -> Result<Comment, RemoteError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "add_comment", format!("/repos/{repo}/issues/{number}/comments"))?;
        state.next_comment_id += 1;
        let comment = Comment::new(state.next_comment_id, self.bot_login.clone(), body);
        state
            .comments
            .entry(issue_key(repo, number))
            .or_default()
            .push(comment.clone());
        state.mutations.push(Mutation::AddComment {
            number,
            body: body.to_string(),
        });
        Ok(comment)
    }

    async fn edit_comment(&self, repo: &RepoName, id: CommentId, body: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        let url = format!("/repos/{repo}/issues/comments/{id}");
        self.check(&state, "edit_comment", url.clone())?;
        let comment = state
            .comments
            .values_mut()
            .flatten()
            .find(|c| c.id == id)
            .ok_or_else(|| Self::not_found(url))?;
        comment.body = body.to_string();
        state.mutations.push(Mutation::EditComment {
            id,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn delete_comment(&self, repo: &RepoName, id: CommentId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "delete_comment", format!("/repos/{repo}/issues/comments/{id}"))?;
        for comments in state.comments.values_mut() {
            comments.retain(|c| c.id != id);
        }
        state.mutations.push(Mutation::DeleteComment { id });
        Ok(())
    }

    async fn issue_labels(&self, repo: &RepoName, number: u64) -> Result<Vec<Label>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "issue_labels", format!("/repos/{repo}/issues/{number}/labels"))?;
        Ok(state
            .labels
            .get(&issue_key(repo, number))
            .map(|names| names.iter().map(|name| Label { name: name.clone() }).collect())
            .unwrap_or_default())
    }

    async fn add_labels(&self, repo: &RepoName, number: u64, labels: &[String]) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "add_labels", format!("/repos/{repo}/issues/{number}/labels"))?;
        let current = state.labels.entry(issue_key(repo, number)).or_default();
        for label in labels {
            if !current.contains(label) {
                current.push(label.clone());
            }
        }
        state.mutations.push(Mutation::AddLabels {
            number,
            labels: labels.to_vec(),
        });
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoName, number: u64, label: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        let url = format!("/repos/{repo}/issues/{number}/labels/{label}");
        self.check(&state, "remove_label", url.clone())?;
        let current = state.labels.entry(issue_key(repo, number)).or_default();
        let before = current.len();
        current.retain(|l| l != label);
        if current.len() == before {
            return Err(Self::not_found(url));
        }
        state.mutations.push(Mutation::RemoveLabel {
            number,
            label: label.to_string(),
        });
        Ok(())
    }

    async fn statuses(&self, repo: &RepoName, sha: &str) -> Result<Vec<CommitStatus>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "statuses", format!("/repos/{repo}/commits/{sha}/statuses"))?;
        Ok(state
            .statuses
            .get(&(repo.full_name(), sha.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_status(&self, repo: &RepoName, sha: &str, status: &StatusRequest) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "set_status", format!("/repos/{repo}/statuses/{sha}"))?;
        state
            .statuses
            .entry((repo.full_name(), sha.to_string()))
            .or_default()
            .insert(
                0,
                CommitStatus {
                    state: status.state,
                    context: status.context.clone(),
                    description: Some(status.description.clone()),
                    target_url: status.target_url.clone(),
                },
            );
        state.mutations.push(Mutation::SetStatus {
            sha: sha.to_string(),
            status: status.clone(),
        });
        Ok(())
    }

    async fn open_pull_requests(&self, repo: &RepoName) -> Result<Vec<PullRequest>, RemoteError> {
        let state = self.state.lock().unwrap();
        self.check(&state, "open_pull_requests", format!("/repos/{repo}/pulls"))?;
        let full_name = repo.full_name();
        let mut prs: Vec<PullRequest> = state
            .pull_requests
            .iter()
            .filter(|((name, _), pr)| *name == full_name && pr.is_open())
            .map(|(_, pr)| pr.clone())
            .collect();
        prs.sort_by_key(|pr| pr.number);
        Ok(prs)
    }
}

// ---------------------------------------------------------------------------
// FakeJenkins
// ---------------------------------------------------------------------------

/// A build queued through [`FakeJenkins`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triggered {
    Parameterized { job: String, params: Vec<(String, String)> },
    Pipeline { job: String, pr_number: u64, git_ref: String },
}

impl Triggered {
    pub fn job(&self) -> &str {
        match self {
            Triggered::Parameterized { job, .. } | Triggered::Pipeline { job, .. } => job,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            Triggered::Parameterized { params, .. } => params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            Triggered::Pipeline { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct JenkinsState {
    triggered: Vec<Triggered>,
    builds: HashMap<String, Vec<RecentBuild>>,
    queued: Vec<QueuedBuild>,
    cancelled: Vec<(String, String, bool)>,
    logs: HashMap<(String, u64), String>,
    failing_jobs: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FakeJenkins {
    state: Mutex<JenkinsState>,
}

impl FakeJenkins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggered(&self) -> Vec<Triggered> {
        self.state.lock().unwrap().triggered.clone()
    }

    pub fn cancelled(&self) -> Vec<(String, String, bool)> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn set_builds(&self, job: &str, builds: Vec<RecentBuild>) {
        self.state.lock().unwrap().builds.insert(job.to_string(), builds);
    }

    pub fn set_queued(&self, queued: Vec<QueuedBuild>) {
        self.state.lock().unwrap().queued = queued;
    }

    pub fn set_log(&self, job: &str, number: u64, log: &str) {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert((job.to_string(), number), log.to_string());
    }

    /// Every trigger of `job` fails with a 500.
    pub fn fail_job(&self, job: &str) {
        self.state.lock().unwrap().failing_jobs.insert(job.to_string());
    }

    fn check(state: &JenkinsState, job: &str, url: String) -> Result<(), RemoteError> {
        if state.failing_jobs.contains(job) {
            return Err(RemoteError::new(Service::Jenkins, url, "injected failure").with_status(500));
        }
        Ok(())
    }
}

#[async_trait]
impl BuildTrigger for FakeJenkins {
    async fn build_with_parameters(&self, job: &str, params: &[(String, String)]) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, job, format!("/job/{job}/buildWithParameters"))?;
        state.triggered.push(Triggered::Parameterized {
            job: job.to_string(),
            params: params.to_vec(),
        });
        Ok(())
    }

    async fn build_pipeline(&self, job: &str, pr_number: u64, git_ref: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, job, format!("/job/{job}/job/PR-{pr_number}/build"))?;
        state.triggered.push(Triggered::Pipeline {
            job: job.to_string(),
            pr_number,
            git_ref: git_ref.to_string(),
        });
        Ok(())
    }

    async fn builds(&self, job: &str) -> Result<Vec<RecentBuild>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.builds.get(job).cloned().unwrap_or_default())
    }

    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>, RemoteError> {
        Ok(self.state.lock().unwrap().queued.clone())
    }

    async fn cancel_build(&self, job: &str, id: &str, queued: bool) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.cancelled.push((job.to_string(), id.to_string(), queued));
        Ok(())
    }

    async fn build_log(&self, job: &str, number: u64) -> Result<String, RemoteError> {
        let state = self.state.lock().unwrap();
        state
            .logs
            .get(&(job.to_string(), number))
            .cloned()
            .ok_or_else(|| {
                RemoteError::new(Service::Jenkins, format!("/job/{job}/{number}/consoleText"), "Not Found")
                    .with_status(404)
            })
    }
}
