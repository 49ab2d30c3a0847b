pub mod diff;
pub mod types;

pub use types::{
    Branch, CommitSummary, Comparison, CreatedPullRequest, FileChange, FileStatus, NewPullRequest, RepoSlug,
    Repository,
};

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "pr-scribe";
const PER_PAGE: usize = 100;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("No commits between branches or PR already exists")]
    NothingToCompare,

    #[error("Invalid repository: {0}")]
    InvalidRepo(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("GitHub token not found in settings or environment")]
    MissingToken,
}

/// Parse a repository reference into its owner and name.
///
/// Accepts `owner/repo` or a GitHub URL such as
/// `https://github.com/owner/repo` (a trailing `.git` is dropped).
pub fn parse_repo_slug(input: &str) -> Result<RepoSlug, GitHubError> {
    let invalid = || GitHubError::InvalidRepo(input.to_string());
    let trimmed = input.trim();

    let segments: Vec<String> = if trimmed.contains("://") {
        let parsed = reqwest::Url::parse(trimmed).map_err(|_| invalid())?;
        if parsed.host_str() != Some("github.com") {
            return Err(invalid());
        }
        parsed
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        trimmed
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    };

    if segments.len() != 2 {
        return Err(invalid());
    }

    let owner = segments[0].clone();
    let repo = segments[1].trim_end_matches(".git").to_string();
    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoSlug { owner, repo })
}

/// Thin client over the handful of GitHub REST endpoints this tool needs.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: SecretString,
}

impl GitHubClient {
    pub fn new(token: SecretString, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(self.token.expose_secret())
    }

    /// List repositories the authenticated user can access, most recently
    /// updated first. Pages are followed until a short page comes back.
    #[instrument(skip(self))]
    pub async fn list_repositories(&self) -> Result<Vec<Repository>, GitHubError> {
        let mut repos = Vec::new();
        let mut page = 1;
        loop {
            debug!(page, "fetching repository page");
            let batch: Vec<Repository> = send_json(self.request(Method::GET, "/user/repos").query(&[
                ("sort", "updated".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]))
            .await?;
            let more = batch.len() == PER_PAGE;
            repos.extend(batch);
            if !more {
                break;
            }
            page += 1;
        }
        debug!(repos = repos.len(), "fetched repositories");
        Ok(repos)
    }

    /// List every branch of a repository.
    #[instrument(skip(self), fields(repo = %slug))]
    pub async fn list_branches(&self, slug: &RepoSlug) -> Result<Vec<Branch>, GitHubError> {
        #[derive(Deserialize)]
        struct CommitRef {
            sha: String,
        }

        #[derive(Deserialize)]
        struct BranchResponse {
            name: String,
            commit: CommitRef,
            #[serde(default)]
            protected: bool,
        }

        let path = format!("/repos/{}/{}/branches", slug.owner, slug.repo);
        let mut branches = Vec::new();
        let mut page = 1;
        loop {
            debug!(page, "fetching branch page");
            let batch: Vec<BranchResponse> = send_json(self.request(Method::GET, &path).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]))
            .await?;
            let more = batch.len() == PER_PAGE;
            branches.extend(batch.into_iter().map(|b| Branch {
                name: b.name,
                sha: b.commit.sha,
                protected: b.protected,
            }));
            if !more {
                break;
            }
            page += 1;
        }
        debug!(branches = branches.len(), "fetched branches");
        Ok(branches)
    }

    /// Compare `base...head` and return the changed files and commits.
    #[instrument(skip(self), fields(repo = %slug))]
    pub async fn compare(&self, slug: &RepoSlug, base: &str, head: &str) -> Result<Comparison, GitHubError> {
        #[derive(Deserialize)]
        struct CommitDetail {
            message: String,
        }

        #[derive(Deserialize)]
        struct CommitResponse {
            sha: String,
            commit: CommitDetail,
        }

        #[derive(Deserialize)]
        struct CompareResponse {
            #[serde(default)]
            files: Vec<FileChange>,
            #[serde(default)]
            commits: Vec<CommitResponse>,
        }

        let path = format!("/repos/{}/{}/compare/{}...{}", slug.owner, slug.repo, base, head);
        let response: CompareResponse = send_json(self.request(Method::GET, &path)).await?;
        debug!(files = response.files.len(), commits = response.commits.len(), "received comparison");

        Ok(Comparison {
            files: response.files,
            commits: response
                .commits
                .into_iter()
                .map(|c| CommitSummary {
                    sha: c.sha,
                    message: c.commit.message,
                })
                .collect(),
        })
    }

    /// Open a pull request. GitHub answers 422 when the branches have no
    /// commits between them or a PR for them already exists.
    #[instrument(skip(self, pr), fields(repo = %slug, head = %pr.head, base = %pr.base))]
    pub async fn create_pull_request(
        &self,
        slug: &RepoSlug,
        pr: &NewPullRequest,
    ) -> Result<CreatedPullRequest, GitHubError> {
        let path = format!("/repos/{}/{}/pulls", slug.owner, slug.repo);
        let created: CreatedPullRequest = send_json(self.request(Method::POST, &path).json(pr))
            .await
            .map_err(|e| match e {
                GitHubError::Status { status: 422, .. } => GitHubError::NothingToCompare,
                other => other,
            })?;
        debug!(number = created.number, id = created.id, url = %created.html_url, "pull request created");
        Ok(created)
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GitHubError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    Ok(response.json::<T>().await?)
}

fn status_error(status: StatusCode, body: &str) -> GitHubError {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    GitHubError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(SecretString::from("test-token".to_string()), &server.uri())
    }

    fn slug() -> RepoSlug {
        RepoSlug {
            owner: "org".to_string(),
            repo: "repo".to_string(),
        }
    }

    #[test]
    fn test_parse_repo_slug_short_form() {
        let slug = parse_repo_slug("org/repo").unwrap();
        assert_eq!(slug.owner, "org");
        assert_eq!(slug.repo, "repo");
    }

    #[test]
    fn test_parse_repo_slug_url() {
        let slug = parse_repo_slug("https://github.com/org/repo.git").unwrap();
        assert_eq!(slug.to_string(), "org/repo");
    }

    #[test]
    fn test_parse_invalid_repo_slug() {
        assert!(parse_repo_slug("https://example.com/org/repo").is_err());
        assert!(parse_repo_slug("just-a-name").is_err());
        assert!(parse_repo_slug("https://github.com/org/repo/pull/42").is_err());
        assert!(parse_repo_slug("").is_err());
    }

    #[tokio::test]
    async fn test_list_branches_follows_pages() {
        let server = MockServer::start().await;
        let full_page: Vec<_> = (0..100)
            .map(|i| json!({"name": format!("b{i}"), "commit": {"sha": format!("s{i}")}, "protected": false}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/branches"))
            .and(query_param("page", "1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/branches"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "main", "commit": {"sha": "abc"}, "protected": true}
            ])))
            .mount(&server)
            .await;

        let branches = client(&server).list_branches(&slug()).await.unwrap();
        assert_eq!(branches.len(), 101);
        let main = branches.last().unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(main.sha, "abc");
        assert!(main.protected);
    }

    #[tokio::test]
    async fn test_list_repositories_follows_pages() {
        let server = MockServer::start().await;
        let full_page: Vec<_> = (0..100)
            .map(|i| json!({"full_name": format!("org/r{i}"), "private": false, "default_branch": "main"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("sort", "updated"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("sort", "updated"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"full_name": "org/private-tool", "private": true}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = client(&server).list_repositories().await.unwrap();
        assert_eq!(repos.len(), 101);
        assert_eq!(repos[0].full_name, "org/r0");
        let last = repos.last().unwrap();
        assert_eq!(last.full_name, "org/private-tool");
        assert!(last.private);
        assert!(last.default_branch.is_none());
    }

    #[tokio::test]
    async fn test_compare_maps_files_and_commits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/compare/main...feature"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [
                    {"filename": "README.md", "status": "modified", "additions": 3, "deletions": 1, "patch": "@@ -1 +1 @@"},
                    {"filename": "src/new.rs", "status": "added", "additions": 80, "deletions": 0}
                ],
                "commits": [
                    {"sha": "c1", "commit": {"message": "Add parser"}}
                ]
            })))
            .mount(&server)
            .await;

        let comparison = client(&server).compare(&slug(), "main", "feature").await.unwrap();
        assert_eq!(comparison.files.len(), 2);
        assert_eq!(comparison.files[1].status, FileStatus::Added);
        assert_eq!(comparison.commits[0].message, "Add parser");
    }

    #[tokio::test]
    async fn test_create_pull_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/org/repo/pulls"))
            .and(body_partial_json(json!({"head": "feature", "base": "main"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "number": 7, "id": 99, "html_url": "https://github.com/org/repo/pull/7"
            })))
            .mount(&server)
            .await;

        let pr = NewPullRequest {
            title: "Add parser".to_string(),
            body: "body".to_string(),
            head: "feature".to_string(),
            base: "main".to_string(),
        };
        let created = client(&server).create_pull_request(&slug(), &pr).await.unwrap();
        assert_eq!(created.number, 7);
        assert_eq!(created.html_url, "https://github.com/org/repo/pull/7");
    }

    #[tokio::test]
    async fn test_create_pull_request_unprocessable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/org/repo/pulls"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})))
            .mount(&server)
            .await;

        let pr = NewPullRequest {
            title: "t".to_string(),
            body: "b".to_string(),
            head: "feature".to_string(),
            base: "main".to_string(),
        };
        let err = client(&server).create_pull_request(&slug(), &pr).await.unwrap_err();
        assert!(matches!(err, GitHubError::NothingToCompare));
    }

    #[tokio::test]
    async fn test_status_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
            .mount(&server)
            .await;

        let err = client(&server).list_repositories().await.unwrap_err();
        match err {
            GitHubError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Bad credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
