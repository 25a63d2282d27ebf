//! Issue and review-comment triage: moving PR review status forward,
//! version and claim labels, and the `+1` user poll.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{BridgeConfig, DEFAULT_CONTEXT};
use crate::error::{BridgeError, RemoteError};
use crate::models::comment_kind::CommentKind;
use crate::models::content::CommentId;
use crate::models::hooks::{IssueAction, IssueComment, IssueEvent, ReviewCommentEvent};
use crate::models::repo::RepoName;
use crate::services::content_service;
use crate::services::github_service::CodeHost;
use crate::services::policy::{CODE_REVIEW_LABEL, DESIGN_REVIEW_LABEL, TRIAGE_LABEL};
use crate::services::reconciler::Reconciler;

static SERVER_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Server:\s+Version:\s+(\d+\.\d+\.\d+)-?(\S*)").unwrap());

pub const CLAIMED_LABEL: &str = "status/claimed";

const CLAIM_TOKENS: &[&str] = &["#dibs", "#claimed", "#mine"];

const POLL_TEMPLATE: &str = r#"*USER POLL*

*The best way to get notified of updates is to use the _Subscribe_ button on this page.*

Please don't use "+1" or "I have this too" comments on issues. We automatically
collect those comments to keep the thread short.

The people listed below have upvoted this issue by leaving a +1 comment:
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// The repository does not handle issue events.
    Skipped,
    /// The action or state does not concern the bridge.
    Ignored,
    Handled,
}

/// Label for a `X.Y.Z[-suffix]` server version.
pub fn label_from_version(version: &str, suffix: &str) -> String {
    let supported = ["cs", "rc", "ce", "ee"];
    if suffix == "dev" {
        "version/master".to_string()
    } else if suffix.is_empty() || supported.iter().any(|p| suffix.starts_with(p)) {
        let minor = version.rsplit_once('.').map_or(version, |(major_minor, _)| major_minor);
        format!("version/{minor}")
    } else {
        "version/unsupported".to_string()
    }
}

/// Version label for an issue body quoting `docker version` output.
pub fn version_label(body: &str) -> Option<String> {
    let caps = SERVER_VERSION.captures(body)?;
    let version = caps.get(1)?.as_str();
    let suffix = caps.get(2).map_or("", |m| m.as_str());
    Some(label_from_version(version, suffix))
}

pub fn is_claim(body: &str) -> bool {
    let body = body.to_lowercase();
    CLAIM_TOKENS.iter().any(|token| body.contains(token))
}

fn is_upvote(body: &str) -> bool {
    matches!(body.trim(), "+1" | ":+1:")
}

/// Advance a PR out of triage after a maintainer comment: `LGTM` means code
/// review, anything else design review. Returns whether the label changed.
pub async fn move_triage_forward(
    reconciler: &Reconciler<'_>,
    repo: &RepoName,
    number: u64,
    comment: &IssueComment,
) -> Result<bool, RemoteError> {
    let from_bot = comment.user.login.eq_ignore_ascii_case(reconciler.bot_login());
    if !comment.is_from_maintainer() || from_bot {
        return Ok(false);
    }
    if !reconciler.label_exists(repo, number, TRIAGE_LABEL).await? {
        return Ok(false);
    }

    let next = if comment.body.trim() == "LGTM" {
        CODE_REVIEW_LABEL
    } else {
        DESIGN_REVIEW_LABEL
    };
    reconciler.toggle_label(repo, number, TRIAGE_LABEL, next).await?;
    tracing::info!(repo = %repo, number, label = next, "Moved triage forward");
    Ok(true)
}

/// Fold `+1` comments into the bot's user poll and delete them.
async fn fold_user_poll(
    host: &dyn CodeHost,
    reconciler: &Reconciler<'_>,
    repo: &RepoName,
    number: u64,
    comment: &IssueComment,
) -> Result<(), BridgeError> {
    let snapshot = content_service::fetch(host, repo, number, false).await?;
    let poll = snapshot.find_comment(&CommentKind::UserPoll, reconciler.bot_login());

    let mut voters: BTreeMap<&str, Vec<CommentId>> = BTreeMap::new();
    voters
        .entry(&comment.user.login)
        .or_default()
        .push(CommentId(comment.id));
    for c in snapshot.comments() {
        if poll.is_some_and(|p| p.id == c.id) || !is_upvote(&c.body) {
            continue;
        }
        let ids = voters.entry(&c.author_login).or_default();
        if !ids.contains(&c.id) {
            ids.push(c.id);
        }
    }

    match poll {
        Some(poll) => {
            let new_voters: Vec<&str> = voters
                .keys()
                .copied()
                .filter(|login| !poll_lists(&poll.body, login))
                .collect();
            if !new_voters.is_empty() {
                let mut body = poll.body.clone();
                for login in new_voters {
                    body.push_str(&format!("\n@{login}"));
                }
                host.edit_comment(repo, poll.id, &body).await?;
            }
        }
        None => {
            let mut body = POLL_TEMPLATE.to_string();
            for login in voters.keys() {
                body.push_str(&format!("\n@{login}"));
            }
            host.add_comment(repo, number, &body).await?;
        }
    }

    for id in voters.values().flatten() {
        host.delete_comment(repo, *id).await?;
    }
    tracing::info!(repo = %repo, number, voters = voters.len(), "Folded +1 comments into user poll");
    Ok(())
}

/// Whether the poll already has a line for `login`.
fn poll_lists(body: &str, login: &str) -> bool {
    body.lines()
        .any(|line| line.trim().strip_prefix('@') == Some(login))
}

/// `issues` and `issue_comment` deliveries.
pub async fn handle_issue_event(
    config: &BridgeConfig,
    host: &dyn CodeHost,
    event: &IssueEvent,
) -> Result<IssueOutcome, BridgeError> {
    let repo = event.repository.repo_name();
    match config.build_by_context_and_repo(DEFAULT_CONTEXT, &repo) {
        Ok(build) if build.handle_issues => {}
        Ok(_) => {
            tracing::warn!(repo = %repo, "Not configured to handle issues");
            return Ok(IssueOutcome::Skipped);
        }
        Err(e) => {
            tracing::warn!(repo = %repo, error = %e, "No build for issue handler, skipping");
            return Ok(IssueOutcome::Skipped);
        }
    }

    let number = event.issue.number;
    tracing::info!(repo = %repo, number, action = ?event.action, "Handling issue event");

    if !matches!(event.action, IssueAction::Opened | IssueAction::Created) || !event.issue.is_open() {
        tracing::debug!(action = ?event.action, state = %event.issue.state, "Ignoring issue event");
        return Ok(IssueOutcome::Ignored);
    }

    let reconciler = Reconciler::new(host, &config.github_user);

    if event.issue.is_pull_request() {
        if let Some(comment) = &event.comment {
            move_triage_forward(&reconciler, &repo, number, comment).await?;
        }
        return Ok(IssueOutcome::Handled);
    }

    if let Some(label) = event.issue.body.as_deref().and_then(version_label) {
        reconciler.add_labels(&repo, number, &[label.as_str()]).await?;
    }

    if let Some(comment) = &event.comment {
        let from_bot = comment.user.login.eq_ignore_ascii_case(&config.github_user);
        if is_claim(&comment.body) && !from_bot {
            reconciler.add_labels(&repo, number, &[CLAIMED_LABEL]).await?;
        }
        if comment.body.trim() == "+1" {
            fold_user_poll(host, &reconciler, &repo, number, comment).await?;
        }
    }

    Ok(IssueOutcome::Handled)
}

/// `pull_request_review_comment` deliveries.
pub async fn handle_review_comment(
    config: &BridgeConfig,
    host: &dyn CodeHost,
    event: &ReviewCommentEvent,
) -> Result<IssueOutcome, BridgeError> {
    if !event.pull_request.is_open() {
        return Ok(IssueOutcome::Ignored);
    }

    let repo = event.repository.repo_name();
    let reconciler = Reconciler::new(host, &config.github_user);
    move_triage_forward(&reconciler, &repo, event.pull_request.number, &event.comment).await?;
    Ok(IssueOutcome::Handled)
}
