//! Issue triage, user polls and Jenkins notifications against the fakes.

mod common;

use ci_bridge::error::BridgeError;
use ci_bridge::fakes::{FakeCodeHost, Mutation};
use ci_bridge::models::comment_kind::CommentKind;
use ci_bridge::models::hooks::{IssueEvent, ReviewCommentEvent};
use ci_bridge::models::jenkins::JenkinsNotification;
use ci_bridge::models::status::StatusState;
use ci_bridge::services::issue_service::{self, IssueOutcome, CLAIMED_LABEL};
use ci_bridge::services::notification_service::{self, NotificationOutcome};
use ci_bridge::services::policy::{CODE_REVIEW_LABEL, DESIGN_REVIEW_LABEL, TRIAGE_LABEL};
use common::*;
use serde_json::json;

fn repository() -> serde_json::Value {
    json!({ "name": "docker", "full_name": "docker/docker", "owner": { "login": "docker" } })
}

fn issue_event(action: &str, is_pr: bool, body: &str, comment: Option<(u64, &str, &str, &str)>) -> IssueEvent {
    let pull_request = is_pr.then(|| json!({ "html_url": "https://github.com/docker/docker/pull/9" }));
    let comment = comment.map(|(id, login, association, text)| {
        json!({
            "id": id,
            "body": text,
            "user": { "login": login },
            "author_association": association
        })
    });
    serde_json::from_value(json!({
        "action": action,
        "issue": {
            "number": 9,
            "state": "open",
            "title": "docker run hangs",
            "body": body,
            "html_url": "https://github.com/docker/docker/issues/9",
            "pull_request": pull_request
        },
        "comment": comment,
        "repository": repository(),
        "sender": { "login": "someone" }
    }))
    .unwrap()
}

#[tokio::test]
async fn maintainer_lgtm_moves_to_code_review() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.set_labels(&repo(), 9, &[TRIAGE_LABEL, "area/networking"]);

    let event = issue_event("created", true, "", Some((1, "tianon", "MEMBER", "LGTM")));
    let outcome = issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(outcome, IssueOutcome::Handled);
    assert_eq!(
        host.labels(&repo(), 9),
        vec!["area/networking".to_string(), CODE_REVIEW_LABEL.to_string()]
    );
}

#[tokio::test]
async fn other_maintainer_comments_move_to_design_review() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.set_labels(&repo(), 9, &[TRIAGE_LABEL]);

    let event = issue_event("created", true, "", Some((1, "tianon", "OWNER", "Needs a design doc")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(host.labels(&repo(), 9), vec![DESIGN_REVIEW_LABEL.to_string()]);
}

#[tokio::test]
async fn outsiders_and_the_bot_do_not_move_triage() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.set_labels(&repo(), 9, &[TRIAGE_LABEL]);

    for (login, association) in [("random", "NONE"), (BOT, "MEMBER")] {
        let event = issue_event("created", true, "", Some((1, login, association, "LGTM")));
        issue_service::handle_issue_event(&config, &host, &event).await.unwrap();
    }

    assert_eq!(host.labels(&repo(), 9), vec![TRIAGE_LABEL.to_string()]);
    assert!(host.mutations().is_empty());
}

#[tokio::test]
async fn triage_only_moves_out_of_triage() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.set_labels(&repo(), 9, &[DESIGN_REVIEW_LABEL]);

    let event = issue_event("created", true, "", Some((1, "tianon", "MEMBER", "LGTM")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(host.labels(&repo(), 9), vec![DESIGN_REVIEW_LABEL.to_string()]);
}

#[tokio::test]
async fn review_comments_move_triage_too() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.set_labels(&repo(), 7, &[TRIAGE_LABEL]);

    let event: ReviewCommentEvent = serde_json::from_value(json!({
        "action": "created",
        "pull_request": pull_request(7),
        "comment": { "id": 5, "body": "LGTM", "user": { "login": "tianon" }, "author_association": "COLLABORATOR" },
        "repository": repository()
    }))
    .unwrap();
    let outcome = issue_service::handle_review_comment(&config, &host, &event).await.unwrap();

    assert_eq!(outcome, IssueOutcome::Handled);
    assert_eq!(host.labels(&repo(), 7), vec![CODE_REVIEW_LABEL.to_string()]);
}

#[tokio::test]
async fn opened_issue_gets_a_version_label() {
    let config = config();
    let host = FakeCodeHost::new(BOT);

    let body = "Output of docker version:\n\nClient:\n Version: 1.12.1\n\nServer:\n Version: 1.12.1\n";
    let event = issue_event("opened", false, body, None);
    let outcome = issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(outcome, IssueOutcome::Handled);
    assert_eq!(host.labels(&repo(), 9), vec!["version/1.12".to_string()]);
}

#[tokio::test]
async fn claims_label_the_issue() {
    let config = config();
    let host = FakeCodeHost::new(BOT);

    let event = issue_event("created", false, "", Some((1, "newcomer", "NONE", "#dibs on this one")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(host.labels(&repo(), 9), vec![CLAIMED_LABEL.to_string()]);
}

#[tokio::test]
async fn upvotes_are_folded_into_one_poll() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.push_comment(&repo(), 9, "alice", "+1");
    host.push_comment(&repo(), 9, "bob", "I see this too, with details");
    let carol = host.push_comment(&repo(), 9, "carol", "+1");

    let event = issue_event("created", false, "", Some((carol.0, "carol", "NONE", "+1")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    let comments = host.comments(&repo(), 9);
    assert_eq!(comments.len(), 2);
    let poll = comments
        .iter()
        .find(|c| CommentKind::UserPoll.matches(&c.body))
        .unwrap();
    assert_eq!(poll.author_login, BOT);
    assert!(poll.body.contains("@alice"));
    assert!(poll.body.contains("@carol"));
    assert!(!poll.body.contains("@bob"));

    // A later vote edits the same poll.
    let dave = host.push_comment(&repo(), 9, "dave", "+1");
    let event = issue_event("created", false, "", Some((dave.0, "dave", "NONE", "+1")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    let polls: Vec<_> = host
        .comments(&repo(), 9)
        .into_iter()
        .filter(|c| CommentKind::UserPoll.matches(&c.body))
        .collect();
    assert_eq!(polls.len(), 1);
    assert!(polls[0].body.contains("@dave"));
    assert_eq!(polls[0].body.matches("@alice").count(), 1);
    assert!(host
        .mutations()
        .iter()
        .any(|m| matches!(m, Mutation::EditComment { id, .. } if *id == polls[0].id)));
}

#[tokio::test]
async fn repeated_upvotes_and_login_prefixes_are_folded() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    host.push_comment(&repo(), 9, "alice", "+1");
    host.push_comment(&repo(), 9, "alice", ":+1:");
    let latest = host.push_comment(&repo(), 9, "alice", "+1");

    let event = issue_event("created", false, "", Some((latest.0, "alice", "NONE", "+1")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    let comments = host.comments(&repo(), 9);
    assert_eq!(comments.len(), 1);
    assert!(CommentKind::UserPoll.matches(&comments[0].body));

    let ali = host.push_comment(&repo(), 9, "ali", "+1");
    let event = issue_event("created", false, "", Some((ali.0, "ali", "NONE", "+1")));
    issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    let comments = host.comments(&repo(), 9);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.lines().any(|l| l == "@ali"));
    assert_eq!(comments[0].body.matches("@alice").count(), 1);
}

#[tokio::test]
async fn repos_without_issue_handling_are_skipped() {
    let config = config_json(json!({
        "builds": [ { "github_repo": "docker/docker", "jenkins_job_name": "docker-pr" } ]
    }));
    let host = FakeCodeHost::new(BOT);

    let event = issue_event("opened", false, "Server:\n Version: 1.12.1\n", None);
    let outcome = issue_service::handle_issue_event(&config, &host, &event).await.unwrap();

    assert_eq!(outcome, IssueOutcome::Skipped);
    assert!(host.mutations().is_empty());
}

#[tokio::test]
async fn edits_and_closed_issues_are_ignored() {
    let config = config();
    let host = FakeCodeHost::new(BOT);

    let edited = issue_event("edited", false, "Server:\n Version: 1.12.1\n", None);
    assert_eq!(
        issue_service::handle_issue_event(&config, &host, &edited).await.unwrap(),
        IssueOutcome::Ignored
    );

    let mut closed = issue_event("opened", false, "Server:\n Version: 1.12.1\n", None);
    closed.issue.state = "closed".into();
    assert_eq!(
        issue_service::handle_issue_event(&config, &host, &closed).await.unwrap(),
        IssueOutcome::Ignored
    );
    assert!(host.mutations().is_empty());
}

fn notification(phase: &str, status: Option<&str>) -> JenkinsNotification {
    serde_json::from_value(json!({
        "name": "docker-pr",
        "build": {
            "number": 42,
            "full_url": "https://jenkins.example.com/job/docker-pr/42/",
            "phase": phase,
            "status": status,
            "parameters": { "GIT_BASE_REPO": "docker/docker", "GIT_SHA1": HEAD_SHA, "PR": "7" }
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn notifications_mirror_the_build_state() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    let jenkins = jenkins();

    let outcome = notification_service::handle_notification(&config, &host, &jenkins, &notification("STARTED", None))
        .await
        .unwrap();
    assert_eq!(outcome, NotificationOutcome::Reported(StatusState::Pending));

    let (sha, status) = host.statuses_set().pop().unwrap();
    assert_eq!(sha, HEAD_SHA);
    assert_eq!(status.context, "janky");
    assert_eq!(status.description, "Jenkins build docker-pr 42 is running");
    assert_eq!(
        status.target_url.as_deref(),
        Some("https://jenkins.example.com/job/docker-pr/42/console")
    );
}

#[tokio::test]
async fn queued_notifications_are_ignored() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    let jenkins = jenkins();

    let outcome = notification_service::handle_notification(&config, &host, &jenkins, &notification("QUEUED", None))
        .await
        .unwrap();
    assert_eq!(outcome, NotificationOutcome::Ignored);
    assert!(host.mutations().is_empty());
}

#[tokio::test]
async fn failures_comment_with_the_log_when_enabled() {
    let config = config_json(json!({ "comment_on_failure": true }));
    let host = FakeCodeHost::new(BOT);
    let jenkins = jenkins();
    jenkins.set_log(
        "docker-pr",
        42,
        "=== RUN TestPull\n--- FAIL: TestPull (2.00s)\n\tpull_test.go:12: timeout\n",
    );

    for _ in 0..2 {
        let failed = notification("COMPLETED", Some("FAILURE"));
        let outcome = notification_service::handle_notification(&config, &host, &jenkins, &failed)
            .await
            .unwrap();
        assert_eq!(outcome, NotificationOutcome::Reported(StatusState::Failure));
    }

    let kind = CommentKind::FailedJob("docker-pr".into());
    let failures: Vec<_> = host
        .comments(&repo(), 7)
        .into_iter()
        .filter(|c| kind.matches(&c.body))
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].body.contains("--- FAIL: TestPull"));

    let passed = notification("COMPLETED", Some("SUCCESS"));
    notification_service::handle_notification(&config, &host, &jenkins, &passed)
        .await
        .unwrap();
    assert!(host.comments(&repo(), 7).is_empty());
}

#[tokio::test]
async fn unknown_jobs_are_configuration_errors() {
    let config = config();
    let host = FakeCodeHost::new(BOT);
    let jenkins = jenkins();

    let mut unknown = notification("STARTED", None);
    unknown.name = "nobody-knows".into();
    let err = notification_service::handle_notification(&config, &host, &jenkins, &unknown)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
}
