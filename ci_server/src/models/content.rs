//! Content snapshot of an issue or pull request.
//!
//! A snapshot is fetched once per inbound event and never mutated; every
//! classifier in [`crate::services::classifier`] reads from it.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub status: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

impl CommitInfo {
    pub fn new(sha: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub author_login: String,
    pub body: String,
}

impl Comment {
    pub fn new(id: u64, author_login: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: CommentId(id),
            author_login: author_login.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContentSnapshot {
    id: u64,
    files: Vec<FileChange>,
    commits: Vec<CommitInfo>,
    comments: Vec<Comment>,
}

impl ContentSnapshot {
    pub fn new(
        id: u64,
        files: Vec<FileChange>,
        commits: Vec<CommitInfo>,
        comments: Vec<Comment>,
    ) -> Self {
        Self {
            id,
            files,
            commits,
            comments,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    pub fn commits(&self) -> &[CommitInfo] {
        &self.commits
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }
}
