//! Repository content fetcher. Builds the [`ContentSnapshot`] every
//! classifier reads.

use crate::error::BridgeError;
use crate::models::content::ContentSnapshot;
use crate::models::repo::RepoName;
use crate::services::github_service::CodeHost;

/// Fetch comments, and for pull requests also commits and files.
///
/// Commits and files are fetched concurrently and joined before comments are
/// read. Any failure discards the whole snapshot; when both concurrent calls
/// fail, both errors are returned together.
pub async fn fetch(
    host: &dyn CodeHost,
    repo: &RepoName,
    number: u64,
    include_commits_and_files: bool,
) -> Result<ContentSnapshot, BridgeError> {
    let (commits, files) = if include_commits_and_files {
        let (commits, files) = tokio::join!(
            host.pull_request_commits(repo, number),
            host.pull_request_files(repo, number),
        );

        match (commits, files) {
            (Ok(commits), Ok(files)) => (commits, files),
            (Err(commits_err), Err(files_err)) => {
                return Err(BridgeError::RemoteBatch(vec![commits_err, files_err]));
            }
            (Err(e), _) | (_, Err(e)) => return Err(e.into()),
        }
    } else {
        (Vec::new(), Vec::new())
    };

    let comments = host.issue_comments(repo, number).await?;

    tracing::debug!(
        repo = %repo,
        number,
        commits = commits.len(),
        files = files.len(),
        comments = comments.len(),
        "Fetched content snapshot"
    );

    Ok(ContentSnapshot::new(number, files, commits, comments))
}
