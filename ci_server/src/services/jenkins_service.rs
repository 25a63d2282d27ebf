//! Jenkins integration: the build-trigger capability and log excerpting.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::JenkinsConfig;
use crate::error::{RemoteError, Service};
use crate::models::jenkins::{
    has_pr_parameter, JobBuildsResponse, QueuedBuild, QueuedBuildsResponse, RecentBuild,
};

static FAIL_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"FAIL(.*?)[\n\r]").unwrap());
static POST_BUILD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PostBuildScript(.*?)[\n\r]").unwrap());

/// Characters of context kept either side of the matched log line.
const LOG_CONTEXT: usize = 500;

const POST_BUILD_MARKER: &str = "Now starting POST-BUILD steps";

/// The build-trigger operations the bridge consumes.
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Queue `job` with a flat key=value parameter set.
    async fn build_with_parameters(&self, job: &str, params: &[(String, String)]) -> Result<(), RemoteError>;

    /// Queue the `PR-<n>` branch job of a multibranch pipeline, or `git_ref`
    /// when there is no pull request.
    async fn build_pipeline(&self, job: &str, pr_number: u64, git_ref: &str) -> Result<(), RemoteError>;

    async fn builds(&self, job: &str) -> Result<Vec<RecentBuild>, RemoteError>;

    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>, RemoteError>;

    async fn cancel_build(&self, job: &str, id: &str, queued: bool) -> Result<(), RemoteError>;

    /// Raw `consoleText` of a finished build.
    async fn build_log(&self, job: &str, number: u64) -> Result<String, RemoteError>;

    async fn running_build_for_pr(&self, job: &str, pr: &str) -> Result<Option<RecentBuild>, RemoteError> {
        let builds = self.builds(job).await?;
        Ok(builds
            .into_iter()
            .find(|b| b.building && has_pr_parameter(&b.actions, pr)))
    }

    async fn queued_build_for_pr(&self, job: &str, pr: &str) -> Result<Option<QueuedBuild>, RemoteError> {
        let queued = self.queued_builds().await?;
        Ok(queued
            .into_iter()
            .find(|b| b.task.name == job && has_pr_parameter(&b.actions, pr)))
    }

    /// Cancel the queued and the running build of `pr`, if any. Both are
    /// attempted; every failure is returned.
    async fn cancel_builds_for_pr(&self, job: &str, pr: &str) -> Vec<RemoteError> {
        let mut errors = Vec::new();

        match self.queued_build_for_pr(job, pr).await {
            Ok(Some(queued)) => match self.cancel_build(job, &queued.id.to_string(), true).await {
                Ok(()) => tracing::info!(job, pr, id = queued.id, "Cancelled queued build"),
                Err(e) => errors.push(e),
            },
            Ok(None) => {}
            Err(e) => errors.push(e),
        }

        match self.running_build_for_pr(job, pr).await {
            Ok(Some(running)) => match self.cancel_build(job, &running.id, false).await {
                Ok(()) => tracing::info!(
                    job,
                    pr,
                    id = %running.id,
                    started_at = ?running.started_at(),
                    node = %running.node_name,
                    "Cancelled running build"
                ),
                Err(e) => errors.push(e),
            },
            Ok(None) => {}
            Err(e) => errors.push(e),
        }

        errors
    }
}

#[derive(Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    token: String,
}

impl JenkinsClient {
    pub fn new(config: &JenkinsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.token))
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        url: &str,
        accepted: &[StatusCode],
    ) -> Result<Response, RemoteError> {
        let resp = builder.send().await.map_err(|e| {
            crate::metrics::remote_error(Service::Jenkins.as_str());
            RemoteError::from_reqwest(Service::Jenkins, url, e)
        })?;

        if !accepted.contains(&resp.status()) {
            let status = resp.status();
            crate::metrics::remote_error(Service::Jenkins.as_str());
            return Err(RemoteError::new(
                Service::Jenkins,
                url,
                format!("responded with status {}", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        let resp = self
            .send(self.request(Method::GET, url), url, &[StatusCode::OK])
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| RemoteError::from_reqwest(Service::Jenkins, url, e))
    }
}

#[async_trait]
impl BuildTrigger for JenkinsClient {
    async fn build_with_parameters(&self, job: &str, params: &[(String, String)]) -> Result<(), RemoteError> {
        let url = format!("{}/job/{job}/buildWithParameters", self.base_url);
        let builder = self.request(Method::POST, &url).query(params);
        self.send(builder, &url, &[StatusCode::CREATED]).await?;
        Ok(())
    }

    async fn build_pipeline(&self, job: &str, pr_number: u64, git_ref: &str) -> Result<(), RemoteError> {
        let sub_job = if pr_number != 0 {
            format!("PR-{pr_number}")
        } else {
            git_ref.to_string()
        };
        let url = format!("{}/job/{job}/job/{sub_job}/build", self.base_url);
        self.send(self.request(Method::POST, &url), &url, &[StatusCode::CREATED])
            .await?;
        Ok(())
    }

    async fn builds(&self, job: &str) -> Result<Vec<RecentBuild>, RemoteError> {
        let url = format!(
            "{}/job/{job}/api/json?tree=builds[builtOn,actions[parameters[name,value]],timestamp,id,building]",
            self.base_url
        );
        let resp: JobBuildsResponse = self.get_json(&url).await?;
        Ok(resp.builds)
    }

    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>, RemoteError> {
        let url = format!(
            "{}/queue/api/json?tree=items[id,actions[parameters[name,value]],task[name]]",
            self.base_url
        );
        let resp: QueuedBuildsResponse = self.get_json(&url).await?;
        Ok(resp.items)
    }

    async fn cancel_build(&self, job: &str, id: &str, queued: bool) -> Result<(), RemoteError> {
        let url = if queued {
            format!("{}/queue/cancelItem?id={id}", self.base_url)
        } else {
            format!("{}/job/{job}/{id}/stop", self.base_url)
        };
        self.send(
            self.request(Method::POST, &url),
            &url,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        )
        .await?;
        Ok(())
    }

    async fn build_log(&self, job: &str, number: u64) -> Result<String, RemoteError> {
        let url = format!("{}/job/{job}/{number}/consoleText", self.base_url);
        let resp = self
            .send(self.request(Method::GET, &url), &url, &[StatusCode::OK])
            .await?;
        resp.text()
            .await
            .map_err(|e| RemoteError::from_reqwest(Service::Jenkins, &url, e))
    }
}

/// Turn a console log into a `Job: <job> [FAILED](<url>)` comment holding
/// the region around the first failure. `None` when no failure line exists.
pub fn failed_build_comment(job: &str, console_url: &str, log: &str) -> Option<String> {
    let matched = FAIL_LINE
        .find(log)
        .or_else(|| POST_BUILD_LINE.find(log))?;

    let mut end = log.len();
    if let Some(post_build) = log.find(POST_BUILD_MARKER) {
        if post_build > 5 {
            end = post_build - 5;
        }
    }
    end = end.min(matched.end() + LOG_CONTEXT);
    let start = matched.start().saturating_sub(LOG_CONTEXT);

    let start = floor_char_boundary(log, start);
    let end = floor_char_boundary(log, end.max(start));

    Some(format!(
        "Job: {job} [FAILED]({console_url}):\n\n~~~console\n\n---\n{}\n---\n\n~~~",
        &log[start..end]
    ))
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
