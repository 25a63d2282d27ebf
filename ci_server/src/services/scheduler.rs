//! Build scheduling: which builds run for a pull request, which commits they
//! build, and the fan-out of Jenkins triggers.

use crate::config::{Build, BuildCommits, BridgeConfig, DOC_CONTEXT, VENDOR_CONTEXT};
use crate::error::{BridgeError, RemoteError};
use crate::models::comment_kind::CommentKind;
use crate::models::content::ContentSnapshot;
use crate::models::hooks::PullRequest;
use crate::models::repo::RepoName;
use crate::models::status::StatusState;
use crate::services::content_service;
use crate::services::github_service::CodeHost;
use crate::services::jenkins_service::BuildTrigger;
use crate::services::reconciler::Reconciler;
use crate::services::status_service::StatusReporter;

const SCHEDULED_DESCRIPTION: &str = "Jenkins build is being scheduled";

/// Builds a pull request should run, given what it changes.
///
/// Every non-custom build of the repo unless the change is non-code only,
/// plus the doc and vendor builds when those trees are touched. A missing
/// doc or vendor build is logged and skipped.
pub fn select_builds<'c>(config: &'c BridgeConfig, repo: &RepoName, snapshot: &ContentSnapshot) -> Vec<&'c Build> {
    let mut builds = Vec::new();

    if !snapshot.is_non_code_only() {
        match config.builds_for_repo(repo, false) {
            Ok(found) => builds.extend(found),
            Err(e) => tracing::warn!(repo = %repo, error = %e, "No builds for repository"),
        }
    }

    let extra = [
        (snapshot.has_docs_changes(), DOC_CONTEXT),
        (snapshot.has_vendoring_changes(), VENDOR_CONTEXT),
    ];
    for (wanted, context) in extra {
        if !wanted {
            continue;
        }
        match config.regular_build_by_context_and_repo(context, repo) {
            Ok(build) if builds.iter().any(|b| std::ptr::eq(*b, build)) => {}
            Ok(build) => builds.push(build),
            Err(e) => tracing::warn!(
                repo = %repo,
                pr = snapshot.id(),
                context,
                error = %e,
                "Adding build failed"
            ),
        }
    }

    builds
}

pub struct Scheduler<'a> {
    config: &'a BridgeConfig,
    host: &'a dyn CodeHost,
    jenkins: &'a dyn BuildTrigger,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a BridgeConfig, host: &'a dyn CodeHost, jenkins: &'a dyn BuildTrigger) -> Self {
        Self { config, host, jenkins }
    }

    /// Commits of `pr` to build under the configured policy. `context` is the
    /// status context the `new` policy checks against.
    pub async fn resolve_shas(
        &self,
        repo: &RepoName,
        pr: &PullRequest,
        context: &str,
    ) -> Result<Vec<String>, RemoteError> {
        match self.config.build_commits {
            BuildCommits::Last => Ok(vec![pr.head.sha.clone()]),
            BuildCommits::All => {
                let commits = self.host.pull_request_commits(repo, pr.number).await?;
                Ok(commits.into_iter().map(|c| c.sha).collect())
            }
            BuildCommits::New => {
                let commits = self.host.pull_request_commits(repo, pr.number).await?;
                let mut shas = Vec::new();
                for commit in commits {
                    let latest = self.latest_status(repo, &commit.sha, context).await;
                    if !latest.is_some_and(|s| s.is_non_failing()) {
                        shas.push(commit.sha);
                    }
                }
                Ok(shas)
            }
        }
    }

    /// Newest status of `sha` for `context`. Statuses come back newest first,
    /// so older entries for the same context are superseded. A failed lookup
    /// counts as no status.
    async fn latest_status(&self, repo: &RepoName, sha: &str, context: &str) -> Option<StatusState> {
        match self.host.statuses(repo, sha).await {
            Ok(statuses) => statuses.into_iter().find(|s| s.context == context).map(|s| s.state),
            Err(e) => {
                tracing::warn!(repo = %repo, sha, error = %e, "Getting statuses failed");
                None
            }
        }
    }

    /// Schedule one build of pull request `number`. Trigger failures are
    /// returned together after every commit has been attempted.
    pub async fn schedule(&self, repo: &RepoName, number: u64, build: &Build) -> Result<usize, BridgeError> {
        let (triggered, errors) = self.schedule_collecting(repo, number, build).await;
        match BridgeError::from_batch(errors) {
            Some(e) => Err(e),
            None => Ok(triggered),
        }
    }

    /// Schedule several builds; one failing build does not stop the rest.
    pub async fn schedule_builds(&self, repo: &RepoName, number: u64, builds: &[&Build]) -> Result<usize, BridgeError> {
        let mut triggered = 0;
        let mut errors = Vec::new();
        for build in builds {
            let (count, mut errs) = self.schedule_collecting(repo, number, build).await;
            triggered += count;
            errors.append(&mut errs);
        }

        match BridgeError::from_batch(errors) {
            Some(e) => Err(e),
            None => Ok(triggered),
        }
    }

    async fn schedule_collecting(&self, repo: &RepoName, number: u64, build: &Build) -> (usize, Vec<RemoteError>) {
        if build.job.is_empty() {
            tracing::debug!(repo = %repo, context = %build.context, "Build has no job, skipping");
            return (0, Vec::new());
        }

        if self.config.cancel_previous_builds {
            for e in self.jenkins.cancel_builds_for_pr(&build.job, &number.to_string()).await {
                tracing::warn!(job = %build.job, pr = number, error = %e, "Cancelling previous build failed");
            }
        }

        if let Err(e) = self.remove_failed_comment(repo, number, &build.job).await {
            tracing::error!(repo = %repo, pr = number, job = %build.job, error = %e, "Removing failed build comment failed");
        }

        let pr = match self.host.pull_request(repo, number).await {
            Ok(pr) => pr,
            Err(e) => {
                tracing::warn!(repo = %repo, pr = number, error = %e, "Getting pull request failed, skipping build");
                return (0, Vec::new());
            }
        };

        let statuses = StatusReporter::new(self.host);
        let target = Some(self.config.jenkins.base_url.as_str());

        if build.is_pipeline {
            if let Err(e) = statuses
                .pending(repo, &pr.head.sha, &build.context, SCHEDULED_DESCRIPTION, target)
                .await
            {
                return (0, vec![e]);
            }
            return match self.jenkins.build_pipeline(&build.job, pr.number, &pr.head.ref_name).await {
                Ok(()) => {
                    crate::metrics::build_triggered(&build.job);
                    tracing::info!(repo = %repo, pr = number, job = %build.job, "Scheduled pipeline build");
                    (1, Vec::new())
                }
                Err(e) => (0, vec![e]),
            };
        }

        let shas = match self.resolve_shas(repo, &pr, &build.context).await {
            Ok(shas) => shas,
            Err(e) => {
                tracing::warn!(repo = %repo, pr = number, job = %build.job, error = %e, "Resolving commits failed, skipping build");
                return (0, Vec::new());
            }
        };

        let mut triggered = 0;
        let mut errors = Vec::new();
        for sha in &shas {
            if let Err(e) = statuses
                .pending(repo, sha, &build.context, SCHEDULED_DESCRIPTION, target)
                .await
            {
                errors.push(e);
                continue;
            }

            let params = build_parameters(repo, &pr, sha);
            match self.jenkins.build_with_parameters(&build.job, &params).await {
                Ok(()) => {
                    triggered += 1;
                    crate::metrics::build_triggered(&build.job);
                    tracing::info!(repo = %repo, pr = number, job = %build.job, sha = %sha, "Scheduled build");
                }
                Err(e) => {
                    tracing::error!(repo = %repo, pr = number, job = %build.job, sha = %sha, error = %e, "Scheduling build failed");
                    errors.push(e);
                }
            }
        }

        (triggered, errors)
    }

    async fn remove_failed_comment(&self, repo: &RepoName, number: u64, job: &str) -> Result<(), BridgeError> {
        let snapshot = content_service::fetch(self.host, repo, number, false).await?;
        Reconciler::new(self.host, &self.config.github_user)
            .remove_comment(repo, &snapshot, &CommentKind::FailedJob(job.to_string()))
            .await?;
        Ok(())
    }

    /// Open pull requests whose head commit's latest status for `context` is
    /// not a success.
    pub async fn failed_prs(&self, repo: &RepoName, context: &str) -> Result<Vec<u64>, RemoteError> {
        let prs = self.host.open_pull_requests(repo).await?;
        let mut numbers = Vec::new();
        for pr in prs {
            if self.latest_status(repo, &pr.head.sha, context).await != Some(StatusState::Success) {
                numbers.push(pr.number);
            }
        }
        Ok(numbers)
    }
}

/// Jenkins parameters for building `sha` of `pr`.
pub fn build_parameters(repo: &RepoName, pr: &PullRequest, sha: &str) -> Vec<(String, String)> {
    vec![
        ("GIT_BASE_REPO".to_string(), repo.full_name()),
        ("GIT_HEAD_REPO".to_string(), pr.head_repo_name()),
        ("GIT_SHA1".to_string(), sha.to_string()),
        ("GITHUB_URL".to_string(), format!("https://github.com/{}/pull/{}", repo.full_name(), pr.number)),
        ("PR".to_string(), pr.number.to_string()),
        ("BASE_BRANCH".to_string(), pr.base.ref_name.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::FileChange;

    fn config() -> BridgeConfig {
        BridgeConfig::from_json_str(
            r#"{ "builds": [
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-pr" },
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-win", "context": "windows" },
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-docs", "context": "doc" },
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-exp", "context": "exp", "custom": true }
            ] }"#,
        )
        .unwrap()
    }

    fn files(paths: &[&str]) -> ContentSnapshot {
        ContentSnapshot::new(1, paths.iter().map(|p| FileChange::new(*p)).collect(), Vec::new(), Vec::new())
    }

    fn jobs(builds: &[&Build]) -> Vec<String> {
        builds.iter().map(|b| b.job.clone()).collect()
    }

    #[test]
    fn code_changes_run_every_non_custom_build_once() {
        let config = config();
        let repo = RepoName::new("docker", "docker");
        let builds = select_builds(&config, &repo, &files(&["daemon/daemon.go", "docs/readme.md"]));
        assert_eq!(jobs(&builds), vec!["docker-pr", "docker-win", "docker-docs"]);
    }

    #[test]
    fn docs_only_changes_run_the_doc_build() {
        let config = config();
        let repo = RepoName::new("docker", "docker");
        let builds = select_builds(&config, &repo, &files(&["docs/readme.md"]));
        assert_eq!(jobs(&builds), vec!["docker-docs"]);
    }

    #[test]
    fn missing_vendor_build_is_skipped() {
        let config = config();
        let repo = RepoName::new("docker", "docker");
        let builds = select_builds(&config, &repo, &files(&["vendor/github.com/x/y.go"]));
        assert_eq!(jobs(&builds), vec!["docker-pr", "docker-win", "docker-docs"]);
    }

    #[test]
    fn custom_builds_are_never_selected_automatically() {
        let config = BridgeConfig::from_json_str(
            r#"{ "builds": [
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-pr" },
                { "github_repo": "docker/docker", "jenkins_job_name": "docker-vendor-manual", "context": "vendor", "custom": true }
            ] }"#,
        )
        .unwrap();
        let repo = RepoName::new("docker", "docker");
        let builds = select_builds(&config, &repo, &files(&["vendor/x/y.go"]));
        assert_eq!(jobs(&builds), vec!["docker-pr"]);
    }

    #[test]
    fn unknown_repo_selects_nothing() {
        let config = config();
        let repo = RepoName::new("docker", "compose");
        assert!(select_builds(&config, &repo, &files(&["main.go"])).is_empty());
    }
}
