//! Bot comment kinds.
//!
//! A posted comment is recognised by a marker substring inside its body, so
//! the marker of each kind must appear verbatim in the text the bot posts.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentKind {
    /// DCO instructions asking the author to sign off.
    SignYourCommits,
    /// The pull request cannot be merged cleanly.
    MergeConflicts,
    /// Advisory about changes under the execdriver tree.
    ExecdriverDeprecation,
    /// The consolidated `+1` tally on an issue.
    UserPoll,
    /// Log excerpt of a failed Jenkins job.
    FailedJob(String),
}

impl CommentKind {
    pub fn marker(&self) -> Cow<'_, str> {
        match self {
            CommentKind::SignYourCommits => Cow::Borrowed("sign your commits"),
            CommentKind::MergeConflicts => Cow::Borrowed("merge conflicts"),
            CommentKind::ExecdriverDeprecation => Cow::Borrowed(
                "concept of execdrivers is being replaced with OCI compliant binaries",
            ),
            CommentKind::UserPoll => Cow::Borrowed("USER POLL"),
            CommentKind::FailedJob(job) => Cow::Owned(format!("Job: {job} [FAILED")),
        }
    }

    /// Whether `body` is a comment of this kind.
    pub fn matches(&self, body: &str) -> bool {
        body.contains(self.marker().as_ref())
    }

    /// The fixed-marker kinds, for exhaustive checks.
    pub fn fixed() -> [CommentKind; 4] {
        [
            CommentKind::SignYourCommits,
            CommentKind::MergeConflicts,
            CommentKind::ExecdriverDeprecation,
            CommentKind::UserPoll,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_distinct() {
        let kinds = CommentKind::fixed();
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert!(!a.marker().contains(b.marker().as_ref()));
                assert!(!b.marker().contains(a.marker().as_ref()));
            }
        }
    }

    #[test]
    fn matching_is_substring_containment() {
        let body = "Looks like we would not be able to merge this PR because of merge conflicts.";
        assert!(CommentKind::MergeConflicts.matches(body));
        assert!(!CommentKind::SignYourCommits.matches(body));
    }

    #[test]
    fn failed_job_marker_carries_the_job() {
        let kind = CommentKind::FailedJob("docker-pr".into());
        assert!(kind.matches("Job: docker-pr [FAILED](http://jenkins/job/docker-pr/4/console):"));
        assert!(!kind.matches("Job: docker-docs [FAILED](http://jenkins)"));
    }
}
