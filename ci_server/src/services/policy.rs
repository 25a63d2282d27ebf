//! DCO, mergeability and triage policy for pull request events.
//!
//! Every decision is recomputed from the hook payload and a freshly fetched
//! [`ContentSnapshot`]. A rejected DCO or an unmergeable branch is an
//! ordinary outcome, not an error: the bookkeeping already done stays, and
//! only build scheduling is skipped.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, RemoteError};
use crate::models::comment_kind::CommentKind;
use crate::models::content::ContentSnapshot;
use crate::models::hooks::{PullRequest, PullRequestAction, PullRequestEvent};
use crate::models::repo::RepoName;
use crate::services::content_service;
use crate::services::github_service::CodeHost;
use crate::services::jenkins_service::BuildTrigger;
use crate::services::reconciler::Reconciler;
use crate::services::scheduler::{self, Scheduler};
use crate::services::status_service::StatusReporter;

pub const DCO_LABEL: &str = "dco/no";
pub const TRIAGE_LABEL: &str = "status/0-triage";
pub const DESIGN_REVIEW_LABEL: &str = "status/1-design-review";
pub const CODE_REVIEW_LABEL: &str = "status/2-code-review";
pub const DOCS_REVIEW_LABEL: &str = "status/3-docs-review";
pub const WINDOWS_LABEL: &str = "group/windows";
pub const FREEBSD_LABEL: &str = "group/freebsd";
pub const DISTRIBUTION_LABEL: &str = "group/distribution";

const MERGE_CONFLICT_COMMENT: &str = "Looks like we would not be able to merge this PR because of merge conflicts. Please rebase, fix conflicts, and force push to your branch.";

const EXECDRIVER_COMMENT: &str = "Please note that concept of execdrivers is being replaced with OCI compliant binaries executed through containerd. There is an ongoing effort for switching to containerd in #20662 . Please consider porting the changes in your PR to this branch instead.";

/// Title term that marks an execdriver change as already moving to the successor.
const EXECDRIVER_SUCCESSOR: &str = "containerd";

// ── Triage decision table ──

/// Predicate results the triage labels are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriageFacts {
    pub proposal: bool,
    pub non_code_only: bool,
    pub windows: bool,
    pub freebsd: bool,
    pub distribution: bool,
}

impl TriageFacts {
    pub fn from_pull_request(pr: &PullRequest, snapshot: &ContentSnapshot) -> Self {
        let title = pr.title.to_lowercase();
        let body = pr.body_text().to_lowercase();
        let mentions = |term: &str| title.contains(term) || body.contains(term);

        Self {
            proposal: title.contains("proposal"),
            non_code_only: snapshot.is_non_code_only(),
            windows: mentions("windows") || snapshot.only_windows(),
            freebsd: mentions("freebsd") || snapshot.only_freebsd(),
            distribution: snapshot.distribution(),
        }
    }
}

pub struct TriageRule {
    pub label: &'static str,
    pub applies: fn(&TriageFacts) -> bool,
}

/// Review status; first match wins.
pub const STATUS_RULES: &[TriageRule] = &[
    TriageRule {
        label: DESIGN_REVIEW_LABEL,
        applies: |f| f.proposal,
    },
    TriageRule {
        label: DOCS_REVIEW_LABEL,
        applies: |f| f.non_code_only,
    },
    TriageRule {
        label: TRIAGE_LABEL,
        applies: |_| true,
    },
];

/// Group labels; every match applies.
pub const GROUP_RULES: &[TriageRule] = &[
    TriageRule {
        label: WINDOWS_LABEL,
        applies: |f| f.windows,
    },
    TriageRule {
        label: FREEBSD_LABEL,
        applies: |f| f.freebsd,
    },
    TriageRule {
        label: DISTRIBUTION_LABEL,
        applies: |f| f.distribution,
    },
];

pub fn triage_labels(facts: &TriageFacts) -> Vec<&'static str> {
    STATUS_RULES
        .iter()
        .find(|rule| (rule.applies)(facts))
        .into_iter()
        .chain(GROUP_RULES.iter().filter(|rule| (rule.applies)(facts)))
        .map(|rule| rule.label)
        .collect()
}

// ── Checks ──

/// Release and version-bump branches skip the DCO check.
pub fn is_release_base(pr: &PullRequest) -> bool {
    let base = pr.base.ref_name.as_str();
    base.starts_with("release") || base.starts_with("bump")
}

/// Only an explicit `false` is unmergeable; unknown is still being computed.
pub fn is_mergeable(pr: &PullRequest) -> bool {
    pr.mergeable != Some(false)
}

pub fn needs_execdriver_notice(pr: &PullRequest, snapshot: &ContentSnapshot) -> bool {
    snapshot.touches_execdriver() && !pr.title.to_lowercase().contains(EXECDRIVER_SUCCESSOR)
}

/// Sign-off instructions with a clone and rebase recipe for this branch.
pub fn dco_comment(pr: &PullRequest, contributing_url: &str) -> String {
    let ssh_url = pr
        .head
        .repo
        .as_ref()
        .and_then(|r| r.ssh_url.as_deref())
        .unwrap_or_default();

    let mut comment = format!(
        "Please sign your commits following these rules:\n{contributing_url}\nThe easiest way to do this is to amend the last commit:\n~~~console\n"
    );
    comment.push_str(&format!("$ git clone -b {:?} {ssh_url} somewhere\n", pr.head.ref_name));
    comment.push_str("$ cd somewhere\n");

    if pr.commits > 1 {
        comment.push_str(&format!("$ git rebase -i HEAD~{}\n", pr.commits));
        comment.push_str("editor opens\nchange each 'pick' to 'edit'\nsave the file and quit\n");
    }

    comment.push_str("$ git commit --amend -s --no-edit\n");
    if pr.commits > 1 {
        comment.push_str("$ git rebase --continue # and repeat the amend for each commit\n");
    }

    comment.push_str("$ git push -f\n");
    comment.push_str("~~~\n\nAmending updates the existing PR. You **DO NOT** need to open a new one.\n");
    comment
}

pub fn dco_context(repo: &RepoName) -> String {
    format!("{}/dco-signed", repo.owner())
}

pub fn mergeable_context(repo: &RepoName) -> String {
    format!("{}/is-mergable", repo.owner())
}

/// Applies the checks of a single pull request.
pub struct PolicyEngine<'a> {
    config: &'a BridgeConfig,
    reconciler: Reconciler<'a>,
    statuses: StatusReporter<'a>,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(config: &'a BridgeConfig, host: &'a dyn CodeHost) -> Self {
        Self {
            config,
            reconciler: Reconciler::new(host, &config.github_user),
            statuses: StatusReporter::new(host),
        }
    }

    /// Triage labels on `opened`, then the sign-off check. Returns whether
    /// the build may proceed.
    pub async fn dco_verified(
        &self,
        repo: &RepoName,
        action: PullRequestAction,
        pr: &PullRequest,
        snapshot: &ContentSnapshot,
    ) -> Result<bool, RemoteError> {
        if !action.is_actionable() {
            return Ok(false);
        }

        if is_release_base(pr) {
            tracing::debug!(repo = %repo, pr = pr.number, base = %pr.base.ref_name, "Release base, skipping DCO");
            return Ok(true);
        }

        if action == PullRequestAction::Opened {
            let labels = triage_labels(&TriageFacts::from_pull_request(pr, snapshot));
            self.reconciler.add_labels(repo, pr.number, &labels).await?;
            tracing::info!(repo = %repo, pr = pr.number, ?labels, "Applied triage labels");
        }

        if !self.config.check_dco {
            return Ok(true);
        }

        let context = dco_context(repo);
        if snapshot.commits_signed() {
            self.reconciler.remove_labels(repo, pr.number, &[DCO_LABEL]).await?;
            self.reconciler
                .remove_comment(repo, snapshot, &CommentKind::SignYourCommits)
                .await?;
            self.statuses
                .success(repo, &pr.head.sha, &context, "All commits signed", None)
                .await?;
            return Ok(true);
        }

        self.reconciler.add_labels(repo, pr.number, &[DCO_LABEL]).await?;
        self.reconciler
            .add_unique_comment(
                repo,
                snapshot,
                &CommentKind::SignYourCommits,
                &dco_comment(pr, &self.config.contributing_url),
            )
            .await?;
        self.statuses
            .failure(
                repo,
                &pr.head.sha,
                &context,
                "Some commits without signature",
                Some(&self.config.contributing_url),
            )
            .await?;
        Ok(false)
    }

    /// Advisory only; never blocks the build.
    pub async fn check_execdriver(
        &self,
        repo: &RepoName,
        pr: &PullRequest,
        snapshot: &ContentSnapshot,
    ) -> Result<(), RemoteError> {
        let kind = CommentKind::ExecdriverDeprecation;
        if needs_execdriver_notice(pr, snapshot) {
            self.reconciler
                .add_unique_comment(repo, snapshot, &kind, EXECDRIVER_COMMENT)
                .await?;
        } else {
            self.reconciler.remove_comment(repo, snapshot, &kind).await?;
        }
        Ok(())
    }

    pub async fn check_mergeable(
        &self,
        repo: &RepoName,
        pr: &PullRequest,
        snapshot: &ContentSnapshot,
    ) -> Result<bool, RemoteError> {
        let kind = CommentKind::MergeConflicts;
        if is_mergeable(pr) {
            self.reconciler.remove_comment(repo, snapshot, &kind).await?;
            return Ok(true);
        }

        tracing::debug!(repo = %repo, pr = pr.number, "Pull request is not mergeable");
        self.reconciler
            .add_unique_comment(repo, snapshot, &kind, MERGE_CONFLICT_COMMENT)
            .await?;
        self.statuses
            .failure(
                repo,
                &pr.head.sha,
                &mergeable_context(repo),
                "This PR is not mergable, please fix conflicts.",
                Some(&self.config.contributing_url),
            )
            .await?;
        Ok(false)
    }
}

// ── Orchestration ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestOutcome {
    /// The action does not concern the bridge.
    Ignored,
    DcoRejected,
    Unmergeable,
    /// Builds were selected; `triggered` counts the downstream jobs queued.
    Scheduled { triggered: usize },
}

/// Action filter, DCO, execdriver notice, mergeability, then scheduling.
pub async fn handle_pull_request(
    config: &BridgeConfig,
    host: &dyn CodeHost,
    jenkins: &dyn BuildTrigger,
    event: &PullRequestEvent,
) -> Result<PullRequestOutcome, BridgeError> {
    if !event.action.is_actionable() {
        tracing::debug!(action = ?event.action, "Ignoring pull request action");
        return Ok(PullRequestOutcome::Ignored);
    }

    let repo = event.base_repo();
    tracing::info!(repo = %repo, pr = event.number, action = ?event.action, "Handling pull request");

    // The hook payload carries a stale mergeable flag; re-read it.
    let pr = host.pull_request(&repo, event.number).await?;
    let snapshot = content_service::fetch(host, &repo, event.number, true).await?;
    let engine = PolicyEngine::new(config, host);

    let verified = engine.dco_verified(&repo, event.action, &pr, &snapshot).await?;
    engine.check_execdriver(&repo, &pr, &snapshot).await?;
    if !verified {
        tracing::warn!(repo = %repo, pr = pr.number, "Invalid DCO, not scheduling builds");
        return Ok(PullRequestOutcome::DcoRejected);
    }

    if !engine.check_mergeable(&repo, &pr, &snapshot).await? {
        tracing::warn!(repo = %repo, pr = pr.number, "Unmergeable pull request, not scheduling builds");
        return Ok(PullRequestOutcome::Unmergeable);
    }

    let builds = scheduler::select_builds(config, &repo, &snapshot);
    let triggered = Scheduler::new(config, host, jenkins)
        .schedule_builds(&repo, pr.number, &builds)
        .await?;
    Ok(PullRequestOutcome::Scheduled { triggered })
}
