//! Jenkins notification payloads and REST API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildPhase {
    Queued,
    Started,
    Completed,
    Finalized,
    #[serde(other)]
    Other,
}

/// Parameters the bridge passed when triggering the build, echoed back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationParameters {
    #[serde(rename = "GIT_BASE_REPO", default)]
    pub git_base_repo: String,
    #[serde(rename = "GIT_SHA1", default)]
    pub git_sha: String,
    #[serde(rename = "PR", default)]
    pub pr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBuild {
    pub number: u64,
    #[serde(rename = "full_url", default)]
    pub url: String,
    pub phase: BuildPhase,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub parameters: NotificationParameters,
}

/// Body posted by the Jenkins notification plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JenkinsNotification {
    pub name: String,
    pub build: NotificationBuild,
}

impl JenkinsNotification {
    pub fn parse(body: &[u8]) -> Result<Self, BridgeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Whether any action carries `PR=<pr>`.
pub fn has_pr_parameter(actions: &[Action], pr: &str) -> bool {
    actions
        .iter()
        .flat_map(|a| a.parameters.iter())
        .any(|p| p.name == "PR" && parameter_text(&p.value) == pr)
}

fn parameter_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecentBuild {
    pub id: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub building: bool,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "builtOn", default)]
    pub node_name: String,
}

impl RecentBuild {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobBuildsResponse {
    #[serde(default)]
    pub builds: Vec<RecentBuild>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueTask {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueuedBuild {
    pub id: u64,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub task: QueueTask,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueuedBuildsResponse {
    #[serde(default)]
    pub items: Vec<QueuedBuild>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completed_notification() {
        let body = br#"{
            "name": "docker-pr",
            "build": {
                "number": 42,
                "full_url": "https://jenkins.example.com/job/docker-pr/42/",
                "phase": "COMPLETED",
                "status": "UNSTABLE",
                "parameters": { "GIT_BASE_REPO": "docker/docker", "GIT_SHA1": "abc", "PR": "7" }
            }
        }"#;
        let n = JenkinsNotification::parse(body).unwrap();
        assert_eq!(n.build.phase, BuildPhase::Completed);
        assert_eq!(n.build.status.as_deref(), Some("UNSTABLE"));
        assert_eq!(n.build.parameters.git_base_repo, "docker/docker");
    }

    #[test]
    fn pr_parameter_matches_strings_and_numbers() {
        let actions: Vec<Action> = serde_json::from_value(serde_json::json!([
            {},
            { "parameters": [ { "name": "GIT_SHA1", "value": "abc" }, { "name": "PR", "value": 12 } ] }
        ]))
        .unwrap();
        assert!(has_pr_parameter(&actions, "12"));
        assert!(!has_pr_parameter(&actions, "1"));
    }
}
