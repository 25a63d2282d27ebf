//! Bridge configuration, loaded from a JSON file, secrets overridable from
//! environment variables.
//!
//! The value is immutable once loaded and handed to every component as an
//! `Arc<BridgeConfig>`.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::BridgeError;
use crate::models::repo::RepoName;

/// Context used when a build or lookup names none.
pub const DEFAULT_CONTEXT: &str = "janky";

/// Context of the documentation-only build.
pub const DOC_CONTEXT: &str = "doc";

/// Context of the vendoring build.
pub const VENDOR_CONTEXT: &str = "vendor";

const DEFAULT_CONTRIBUTING_URL: &str =
    "https://github.com/docker/docker/blob/master/CONTRIBUTING.md#sign-your-work";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct JenkinsConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

/// Which commits of a pull request get a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildCommits {
    /// Every commit in the pull request.
    All,
    /// Commits without a pending or successful status for the build context.
    New,
    /// Only the head commit. Unknown values fall back to this.
    #[default]
    #[serde(other)]
    Last,
}

/// A downstream Jenkins job bound to a repository and status context.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Build {
    #[serde(rename = "github_repo")]
    pub repo: RepoName,
    /// Empty for label-only entries that never trigger CI.
    #[serde(rename = "jenkins_job_name", default)]
    pub job: String,
    #[serde(default)]
    pub context: String,
    /// Reachable only through the authenticated manual endpoints.
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub handle_issues: bool,
    #[serde(default)]
    pub is_pipeline: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub jenkins: JenkinsConfig,
    #[serde(default)]
    pub build_commits: BuildCommits,
    #[serde(default)]
    pub github_token: String,
    /// Login of the bot account; used to recognise its own comments.
    #[serde(default)]
    pub github_user: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default)]
    pub builds: Vec<Build>,
    /// Basic auth for the manual build endpoints.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default = "default_true")]
    pub check_dco: bool,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_contributing_url")]
    pub contributing_url: String,
    #[serde(default)]
    pub comment_on_failure: bool,
    #[serde(default)]
    pub cancel_previous_builds: bool,
}

fn default_true() -> bool {
    true
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_contributing_url() -> String {
    DEFAULT_CONTRIBUTING_URL.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            jenkins: JenkinsConfig::default(),
            build_commits: BuildCommits::default(),
            github_token: String::new(),
            github_user: String::new(),
            github_api_url: default_github_api_url(),
            builds: Vec::new(),
            user: String::new(),
            pass: String::new(),
            check_dco: true,
            webhook_secret: String::new(),
            contributing_url: default_contributing_url(),
            comment_on_failure: false,
            cancel_previous_builds: false,
        }
    }
}

impl BridgeConfig {
    /// Read, override from the environment, normalise and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("could not read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env();
        config.warn_missing_secrets();
        Ok(config)
    }

    /// Parse a JSON document and validate the build table.
    pub fn from_json_str(raw: &str) -> Result<Self, BridgeError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| {
            BridgeError::config(format!("error parsing config file as json: {e}"))
        })?;
        config.normalized().validated()
    }

    fn apply_env(&mut self) {
        let overrides = [
            ("CI_GITHUB_TOKEN", &mut self.github_token),
            ("CI_GITHUB_USER", &mut self.github_user),
            ("CI_WEBHOOK_SECRET", &mut self.webhook_secret),
            ("CI_JENKINS_TOKEN", &mut self.jenkins.token),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }

        if let Ok(policy) = std::env::var("CI_BUILD_COMMITS") {
            self.build_commits = match policy.as_str() {
                "all" => BuildCommits::All,
                "new" => BuildCommits::New,
                _ => BuildCommits::Last,
            };
        }
    }

    fn warn_missing_secrets(&self) {
        if self.webhook_secret.is_empty() {
            tracing::warn!("CI_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if self.github_token.is_empty() {
            tracing::warn!("CI_GITHUB_TOKEN not set -- GitHub API calls will be unauthenticated");
        }
        if self.github_user.is_empty() {
            tracing::warn!("github_user not set -- bot comments cannot be deduplicated");
        }
    }

    fn normalized(mut self) -> Self {
        for build in &mut self.builds {
            if build.context.is_empty() {
                build.context = DEFAULT_CONTEXT.to_string();
            }
        }
        self.jenkins.base_url = self.jenkins.base_url.trim_end_matches('/').to_string();
        self.github_api_url = self.github_api_url.trim_end_matches('/').to_string();
        self
    }

    /// At most one non-custom build per (repo, context).
    fn validated(self) -> Result<Self, BridgeError> {
        let mut seen = HashSet::new();
        for build in self.builds.iter().filter(|b| !b.custom) {
            if !seen.insert((&build.repo, build.context.as_str())) {
                return Err(BridgeError::config(format!(
                    "duplicate non-custom build for repo {} and context {}",
                    build.repo, build.context
                )));
            }
        }
        Ok(self)
    }

    /// Every build of `repo` with the given custom flag; an error when none.
    pub fn builds_for_repo(&self, repo: &RepoName, custom: bool) -> Result<Vec<&Build>, BridgeError> {
        let builds: Vec<&Build> = self
            .builds
            .iter()
            .filter(|b| &b.repo == repo && b.custom == custom)
            .collect();

        if builds.is_empty() {
            return Err(BridgeError::config(format!("could not find config for {repo}")));
        }
        Ok(builds)
    }

    pub fn build_by_job(&self, job: &str) -> Result<&Build, BridgeError> {
        self.builds
            .iter()
            .find(|b| b.job == job)
            .ok_or_else(|| BridgeError::config(format!("could not find config for job {job}")))
    }

    /// The build for (context, repo). An empty context means the default one;
    /// a non-custom build wins over a custom build with the same context.
    pub fn build_by_context_and_repo(&self, context: &str, repo: &RepoName) -> Result<&Build, BridgeError> {
        let context = if context.is_empty() { DEFAULT_CONTEXT } else { context };
        let mut matching = self
            .builds
            .iter()
            .filter(|b| b.context == context && &b.repo == repo);

        let first = matching.next();
        first
            .filter(|b| !b.custom)
            .or_else(|| matching.find(|b| !b.custom))
            .or(first)
            .ok_or_else(|| {
                BridgeError::config(format!(
                    "could not find config for context: {context}, repo: {repo}"
                ))
            })
    }

    /// The non-custom build for (context, repo). Pull request events only
    /// ever schedule these; custom builds stay behind the manual endpoints.
    pub fn regular_build_by_context_and_repo(&self, context: &str, repo: &RepoName) -> Result<&Build, BridgeError> {
        let context = if context.is_empty() { DEFAULT_CONTEXT } else { context };
        self.builds
            .iter()
            .find(|b| !b.custom && b.context == context && &b.repo == repo)
            .ok_or_else(|| {
                BridgeError::config(format!(
                    "could not find non-custom config for context: {context}, repo: {repo}"
                ))
            })
    }
}
