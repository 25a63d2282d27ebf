//! Content classifiers: pure predicates over a [`ContentSnapshot`].

use std::sync::LazyLock;

use regex::Regex;

use crate::models::comment_kind::CommentKind;
use crate::models::content::{Comment, ContentSnapshot};

static DCO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(Docker-DCO-1.1-)?Signed-off-by: ([^<]+) <([^<>@]+@[^<>]+)>( \(github: ([a-zA-Z0-9][a-zA-Z0-9-]+)\))?",
    )
    .unwrap()
});

/// Directories that never contain code.
const NON_CODE_PREFIXES: &[&str] = &["man/", "docs/", "experimental/"];

/// `contrib/` trees holding completions, editor syntax files and packaging
/// metadata rather than code.
const NON_CODE_CONTRIB_PREFIXES: &[&str] = &[
    "contrib/completion/",
    "contrib/syntax/",
    "contrib/desktop-integration/",
    "contrib/builder/",
];

const VENDORING_PREFIXES: &[&str] = &["vendor/", "hack/vendor.sh", "hack/.vendor-helper.sh"];

/// Top-level directories owned by the distribution group.
const DISTRIBUTION_DIRS: &[&str] = &["registry", "graph", "image", "trust", "builder"];

/// Whether a commit message carries a sign-off trailer on any line.
pub fn is_signed_off(message: &str) -> bool {
    DCO_REGEX.is_match(message)
}

fn top_level_dir(path: &str) -> Option<&str> {
    path.split_once('/').map(|(dir, _)| dir)
}

impl ContentSnapshot {
    /// Vacuously true without commits.
    pub fn commits_signed(&self) -> bool {
        self.commits().iter().all(|c| is_signed_off(&c.message))
    }

    /// Every file is markdown under `docs`. An empty diff is never docs-only.
    pub fn is_docs_only(&self) -> bool {
        !self.files().is_empty()
            && self
                .files()
                .iter()
                .all(|f| f.path.ends_with(".md") && f.path.starts_with("docs"))
    }

    /// Every file sits in a documentation or otherwise non-code tree.
    pub fn is_non_code_only(&self) -> bool {
        !self.files().is_empty()
            && self.files().iter().all(|f| {
                NON_CODE_PREFIXES
                    .iter()
                    .chain(NON_CODE_CONTRIB_PREFIXES)
                    .any(|p| f.path.starts_with(p))
            })
    }

    pub fn has_docs_changes(&self) -> bool {
        self.files().iter().any(|f| f.path.starts_with("docs/"))
    }

    pub fn has_vendoring_changes(&self) -> bool {
        self.files()
            .iter()
            .any(|f| VENDORING_PREFIXES.iter().any(|p| f.path.starts_with(p)))
    }

    pub fn has_protobuf_changes(&self) -> bool {
        self.files()
            .iter()
            .any(|f| f.path.ends_with(".proto") || f.path.ends_with(".pb.go"))
    }

    /// Some file lives under a distribution directory at the repo root.
    pub fn distribution(&self) -> bool {
        self.files()
            .iter()
            .filter_map(|f| top_level_dir(&f.path))
            .any(|dir| DISTRIBUTION_DIRS.contains(&dir))
    }

    /// Some path goes through an `execdriver` directory.
    pub fn touches_execdriver(&self) -> bool {
        self.files()
            .iter()
            .any(|f| f.path.split('/').rev().skip(1).any(|dir| dir == "execdriver"))
    }

    pub fn only_windows(&self) -> bool {
        self.only_os("windows")
    }

    pub fn only_freebsd(&self) -> bool {
        self.only_os("freebsd")
    }

    /// At least one `_<os>.go` file and no `_linux.go` file.
    fn only_os(&self, os: &str) -> bool {
        let suffix = format!("_{os}.go");
        let has_os = self.files().iter().any(|f| f.path.ends_with(&suffix));
        let has_linux = self.files().iter().any(|f| f.path.ends_with("_linux.go"));
        has_os && !has_linux
    }

    /// First comment of `kind` authored by `bot_login` (case-insensitive).
    pub fn find_comment(&self, kind: &CommentKind, bot_login: &str) -> Option<&Comment> {
        self.comments()
            .iter()
            .find(|c| c.author_login.eq_ignore_ascii_case(bot_login) && kind.matches(&c.body))
    }

    pub fn already_commented(&self, kind: &CommentKind, bot_login: &str) -> bool {
        self.find_comment(kind, bot_login).is_some()
    }
}
