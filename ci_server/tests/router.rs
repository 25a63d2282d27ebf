//! HTTP surface of the bridge, driven through the router with fakes behind it.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ci_bridge::config::BridgeConfig;
use ci_bridge::fakes::{FakeCodeHost, FakeJenkins};
use ci_bridge::models::status::{CommitStatus, StatusState};
use ci_bridge::routes::{self, AppState};
use common::*;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

const SECRET: &str = "s3cret";

struct Harness {
    host: Arc<FakeCodeHost>,
    jenkins: Arc<FakeJenkins>,
    app: Router,
}

fn harness(config: BridgeConfig) -> Harness {
    let host = Arc::new(FakeCodeHost::new(BOT));
    let jenkins = Arc::new(FakeJenkins::new());
    let state = AppState {
        config: Arc::new(config),
        github: host.clone(),
        jenkins: jenkins.clone(),
    };
    Harness {
        host,
        jenkins,
        app: routes::router(state, Duration::from_secs(5)),
    }
}

fn secured_config() -> BridgeConfig {
    config_json(json!({ "webhook_secret": SECRET, "user": "admin", "pass": "hunter2" }))
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn github_request(event: &str, body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/notification/github")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-github-event", event);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

fn build_request(path: &str, body: serde_json::Value, credentials: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((user, pass)) = credentials {
        let token = STANDARD.encode(format!("{user}:{pass}"));
        builder = builder.header(header::AUTHORIZATION, format!("Basic {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn ping_answers_pong() {
    let h = harness(config());
    let resp = h
        .app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"pong");
}

#[tokio::test]
async fn notifications_only_accept_post() {
    let h = harness(config());
    let resp = h
        .app
        .oneshot(
            Request::builder()
                .uri("/notification/jenkins")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn bad_signatures_are_rejected() {
    let h = harness(secured_config());
    let body = br#"{"zen": "Keep it logically awesome."}"#.to_vec();

    let unsigned = h
        .app
        .clone()
        .oneshot(github_request("ping", body.clone(), None))
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let forged = h
        .app
        .clone()
        .oneshot(github_request("ping", body.clone(), Some(format!("sha256={}", "00".repeat(32)))))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let signature = sign(&body);
    let signed = h
        .app
        .oneshot(github_request("ping", body, Some(signature)))
        .await
        .unwrap();
    assert_eq!(signed.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_and_untyped_hooks_are_bad_requests() {
    let h = harness(config());

    let malformed = h
        .app
        .clone()
        .oneshot(github_request("pull_request", b"{not json".to_vec(), None))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let untyped = h
        .app
        .oneshot(github_request("", b"{}".to_vec(), None))
        .await
        .unwrap();
    assert_eq!(untyped.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let h = harness(config());
    let resp = h
        .app
        .oneshot(github_request("watch", b"{}".to_vec(), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(h.host.mutations().is_empty());
}

#[tokio::test]
async fn pull_request_hook_schedules_builds() {
    let h = harness(config());
    let pr = pull_request(7);
    h.host.insert_pull_request(&repo(), pr.clone());
    h.host.set_commits(&repo(), 7, vec![signed("a1")]);
    h.host.set_files(&repo(), 7, &["daemon/daemon.go"]);

    let body = event_json("synchronize", &pr).to_string().into_bytes();
    let resp = h
        .app
        .clone()
        .oneshot(github_request("pull_request", body, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.jenkins.triggered().len(), 2);

    let closed = event_json("closed", &pr).to_string().into_bytes();
    let resp = h
        .app
        .oneshot(github_request("pull_request", closed, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn remote_failures_surface_as_server_errors() {
    let h = harness(config());
    let pr = pull_request(7);
    h.host.insert_pull_request(&repo(), pr.clone());
    h.host.fail_on("issue_comments");

    let body = event_json("synchronize", &pr).to_string().into_bytes();
    let resp = h
        .app
        .oneshot(github_request("pull_request", body, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn jenkins_notifications_set_statuses() {
    let h = harness(config());
    let body = json!({
        "name": "docker-pr",
        "build": {
            "number": 3,
            "full_url": "https://jenkins.example.com/job/docker-pr/3/",
            "phase": "COMPLETED",
            "status": "SUCCESS",
            "parameters": { "GIT_BASE_REPO": "docker/docker", "GIT_SHA1": HEAD_SHA, "PR": "7" }
        }
    });
    let resp = h
        .app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/notification/jenkins")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let (_, status) = h.host.statuses_set().pop().unwrap();
    assert_eq!(status.state, StatusState::Success);
    assert_eq!(status.description, "Jenkins build docker-pr 3 has succeeded");
}

#[tokio::test]
async fn manual_builds_require_credentials() {
    let h = harness(secured_config());
    let request = json!({ "number": 7, "repo": "docker/docker", "context": "experimental" });

    for credentials in [None, Some(("admin", "wrong"))] {
        let resp = h
            .app
            .clone()
            .oneshot(build_request("/build/custom", request.clone(), credentials))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    assert!(h.jenkins.triggered().is_empty());
}

#[tokio::test]
async fn custom_builds_reach_custom_jobs() {
    let h = harness(secured_config());
    h.host.insert_pull_request(&repo(), pull_request(7));
    let request = json!({ "number": 7, "repo": "docker/docker", "context": "experimental" });

    let resp = h
        .app
        .oneshot(build_request("/build/custom", request, Some(("admin", "hunter2"))))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let triggered = h.jenkins.triggered();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].job(), "docker-exp");
}

#[tokio::test]
async fn retry_without_context_runs_every_regular_build() {
    let h = harness(secured_config());
    h.host.insert_pull_request(&repo(), pull_request(7));
    let request = json!({ "number": 7, "repo": "docker/docker" });

    let resp = h
        .app
        .oneshot(build_request("/build/retry", request, Some(("admin", "hunter2"))))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let jobs: Vec<String> = h.jenkins.triggered().iter().map(|t| t.job().to_string()).collect();
    assert_eq!(jobs, vec!["docker-pr", "docker-docs"]);
}

#[tokio::test]
async fn manual_build_for_unknown_repo_is_a_server_error() {
    let h = harness(secured_config());
    let request = json!({ "number": 7, "repo": "docker/compose" });

    let resp = h
        .app
        .oneshot(build_request("/build/custom", request, Some(("admin", "hunter2"))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cron_rebuilds_prs_without_a_green_status() {
    let h = harness(secured_config());
    for number in [7, 8] {
        let mut pr = pull_request(number);
        pr.head.sha = format!("sha{number}");
        h.host.insert_pull_request(&repo(), pr);
    }
    h.host.push_status(
        &repo(),
        "sha8",
        CommitStatus {
            state: StatusState::Success,
            context: "janky".into(),
            description: None,
            target_url: None,
        },
    );

    let resp = h
        .app
        .oneshot(build_request(
            "/build/cron",
            json!({ "repo": "docker/docker", "context": "janky" }),
            Some(("admin", "hunter2")),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let triggered = h.jenkins.triggered();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].job(), "docker-pr");
    assert_eq!(triggered[0].param("PR"), Some("7"));
}
