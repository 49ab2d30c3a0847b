use serde::{Deserialize, Serialize};

/// Change status of a single file in a comparison.
///
/// GitHub also reports `changed` and `unchanged`; both are folded into
/// `Modified` since they carry no distinct meaning for a PR description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    #[serde(alias = "changed", alias = "unchanged")]
    Modified,
    Renamed,
    Copied,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Added => write!(f, "ADDED"),
            FileStatus::Removed => write!(f, "REMOVED"),
            FileStatus::Modified => write!(f, "MODIFIED"),
            FileStatus::Renamed => write!(f, "RENAMED"),
            FileStatus::Copied => write!(f, "COPIED"),
        }
    }
}

/// A single file within a branch comparison.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileChange {
    /// Repository-relative path (e.g., "src/auth/config.rs")
    #[serde(rename = "filename")]
    pub path: String,
    pub status: FileStatus,
    /// Lines added in this file
    #[serde(default)]
    pub additions: usize,
    /// Lines deleted in this file
    #[serde(default)]
    pub deletions: usize,
    /// Unified diff hunk text, absent for binary or very large files
    #[serde(default)]
    pub patch: Option<String>,
}

impl FileChange {
    pub fn new(path: &str, status: FileStatus, additions: usize, deletions: usize) -> Self {
        Self {
            path: path.to_string(),
            status,
            additions,
            deletions,
            patch: None,
        }
    }
}

/// One commit between the base and head of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
}

/// Result of comparing two branches.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    pub files: Vec<FileChange>,
    pub commits: Vec<CommitSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
    pub protected: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Fields sent when opening a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// Branch holding the changes
    pub head: String,
    /// Branch the changes merge into
    pub base: String,
}

/// What GitHub hands back after a pull request is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub id: u64,
    pub html_url: String,
}

/// The `owner/repo` pair identifying a repository.
/// Extracted by parse_repo_slug() in github/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
