//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use ci_bridge::config::BridgeConfig;
use ci_bridge::fakes::{FakeCodeHost, FakeJenkins};
use ci_bridge::models::content::CommitInfo;
use ci_bridge::models::hooks::{PullRequest, PullRequestEvent};
use ci_bridge::models::repo::RepoName;
use serde_json::json;

pub const BOT: &str = "gordontheturtle";
pub const HEAD_SHA: &str = "1a2b3c";
pub const JENKINS_URL: &str = "https://jenkins.example.com";

pub fn repo() -> RepoName {
    RepoName::new("docker", "docker")
}

pub fn config_json(extra: serde_json::Value) -> BridgeConfig {
    let mut base = json!({
        "jenkins": { "base_url": JENKINS_URL, "username": "bot", "token": "t" },
        "github_user": BOT,
        "builds": [
            { "github_repo": "docker/docker", "jenkins_job_name": "docker-pr", "handle_issues": true },
            { "github_repo": "docker/docker", "jenkins_job_name": "docker-docs", "context": "doc" },
            { "github_repo": "docker/docker", "jenkins_job_name": "docker-exp", "context": "experimental", "custom": true }
        ]
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    BridgeConfig::from_json_str(&base.to_string()).unwrap()
}

pub fn config() -> BridgeConfig {
    config_json(json!({}))
}

pub fn pull_request_json(number: u64, base_ref: &str, mergeable: Option<bool>) -> serde_json::Value {
    json!({
        "number": number,
        "state": "open",
        "title": "Fix the thing",
        "body": "It was broken.",
        "html_url": format!("https://github.com/docker/docker/pull/{number}"),
        "head": {
            "ref": "fix-thing",
            "sha": HEAD_SHA,
            "repo": {
                "name": "docker",
                "full_name": "calavera/docker",
                "owner": { "login": "calavera" },
                "ssh_url": "git@github.com:calavera/docker.git"
            }
        },
        "base": {
            "ref": base_ref,
            "sha": "ffffff",
            "repo": {
                "name": "docker",
                "full_name": "docker/docker",
                "owner": { "login": "docker" }
            }
        },
        "commits": 1,
        "mergeable": mergeable,
        "user": { "login": "calavera" }
    })
}

pub fn pull_request(number: u64) -> PullRequest {
    serde_json::from_value(pull_request_json(number, "master", Some(true))).unwrap()
}

pub fn event(action: &str, pr: &PullRequest) -> PullRequestEvent {
    serde_json::from_value(event_json(action, pr)).unwrap()
}

pub fn event_json(action: &str, pr: &PullRequest) -> serde_json::Value {
    json!({
        "action": action,
        "number": pr.number,
        "pull_request": pr,
        "repository": {
            "name": "docker",
            "full_name": "docker/docker",
            "owner": { "login": "docker" }
        },
        "sender": { "login": "calavera" }
    })
}

pub fn signed(sha: &str) -> CommitInfo {
    CommitInfo::new(sha, "Fix the thing\n\nSigned-off-by: Jane Doe <jane@example.com>")
}

pub fn unsigned(sha: &str) -> CommitInfo {
    CommitInfo::new(sha, "Fix the thing")
}

/// A host holding one open pull request with the given commits and files.
pub fn host_with(pr: PullRequest, commits: Vec<CommitInfo>, files: &[&str]) -> FakeCodeHost {
    let host = FakeCodeHost::new(BOT);
    let number = pr.number;
    host.insert_pull_request(&repo(), pr);
    host.set_commits(&repo(), number, commits);
    host.set_files(&repo(), number, files);
    host
}

pub fn jenkins() -> FakeJenkins {
    FakeJenkins::new()
}
