//! GitHub adapters for covdelta.
//!
//! - [`GithubEventSource`] reads the Actions event payload to find the PR.
//! - [`StaticPullRequest`] carries a PR number given on the command line.
//! - [`GithubCommentPoster`] creates or updates the coverage comment through
//!   the REST API.

use std::path::PathBuf;

use covdelta_ports::{CommentPoster, PullRequestSource};
use covdelta_render::{COMMENT_MARKER, render_comment_body};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Default REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Comments requested per page when searching for the marker.
pub const COMMENTS_PER_PAGE: usize = 100;

const USER_AGENT: &str = "covdelta";
const ACCEPT: &str = "application/vnd.github.v3+json";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the GitHub adapters.
#[derive(Debug, Error)]
pub enum GithubError {
    /// The event payload file could not be read.
    #[error("Failed to read event payload {path}: {source}")]
    EventRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The event payload is not valid JSON.
    #[error("Invalid event payload: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    /// The repository is not in `owner/name` form.
    #[error("Invalid repository '{0}', expected owner/name")]
    InvalidRepository(String),

    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("GitHub API request failed: {status} - {body}")]
    Api { status: u16, body: String },
}

// ============================================================================
// Pull Request Detection
// ============================================================================

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    number: u64,
}

/// Extract `pull_request.number` from an Actions event payload.
///
/// Payloads of non-PR events (push, schedule, ...) yield `None`.
///
/// # Examples
///
/// ```
/// use covdelta_adapters_github::pull_request_number_from_event;
///
/// let event = r#"{"action":"opened","pull_request":{"number":42}}"#;
/// assert_eq!(pull_request_number_from_event(event).unwrap(), Some(42));
/// assert_eq!(pull_request_number_from_event(r#"{"ref":"refs/heads/main"}"#).unwrap(), None);
/// ```
pub fn pull_request_number_from_event(text: &str) -> Result<Option<u64>, GithubError> {
    let payload: EventPayload = serde_json::from_str(text)?;
    Ok(payload.pull_request.map(|pr| pr.number))
}

/// Pull request source backed by the `GITHUB_EVENT_PATH` payload file.
#[derive(Debug, Clone, Default)]
pub struct GithubEventSource {
    event_path: Option<PathBuf>,
}

impl GithubEventSource {
    /// Create a source reading `event_path`; `None` means no event context.
    pub fn new(event_path: Option<PathBuf>) -> Self {
        Self { event_path }
    }

    fn read_number(&self) -> Result<Option<u64>, GithubError> {
        let Some(path) = &self.event_path else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path).map_err(|source| GithubError::EventRead {
            path: path.display().to_string(),
            source,
        })?;
        pull_request_number_from_event(&text)
    }
}

impl PullRequestSource for GithubEventSource {
    fn pull_request_number(&self) -> Result<Option<u64>, String> {
        self.read_number().map_err(|e| e.to_string())
    }
}

/// Pull request source with a fixed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPullRequest(pub u64);

impl PullRequestSource for StaticPullRequest {
    fn pull_request_number(&self) -> Result<Option<u64>, String> {
        Ok(Some(self.0))
    }
}

// ============================================================================
// Comment Upsert
// ============================================================================

/// An issue comment as returned by the REST API (only the fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

/// Find the first comment carrying the covdelta marker.
pub fn find_marked_comment(comments: &[IssueComment]) -> Option<u64> {
    comments
        .iter()
        .find(|c| {
            c.body
                .as_deref()
                .is_some_and(|body| body.contains(COMMENT_MARKER))
        })
        .map(|c| c.id)
}

/// Build the JSON payload for creating or updating a comment.
pub fn comment_payload(summary: &str, difference: &str) -> serde_json::Value {
    json!({ "body": render_comment_body(summary, difference) })
}

/// Posts the coverage comment through the GitHub REST API.
pub struct GithubCommentPoster {
    client: reqwest::blocking::Client,
    api_url: String,
    repository: String,
    token: String,
}

impl GithubCommentPoster {
    /// Create a poster for `repository` (`owner/name`).
    pub fn new(api_url: &str, repository: &str, token: &str) -> Result<Self, GithubError> {
        Self::with_client(reqwest::blocking::Client::new(), api_url, repository, token)
    }

    /// Like [`GithubCommentPoster::new`], with a preconfigured HTTP client.
    pub fn with_client(
        client: reqwest::blocking::Client,
        api_url: &str,
        repository: &str,
        token: &str,
    ) -> Result<Self, GithubError> {
        let valid = repository
            .split_once('/')
            .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
        if !valid {
            return Err(GithubError::InvalidRepository(repository.to_string()));
        }

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            token: token.to_string(),
        })
    }

    fn comments_url(&self, pr: u64) -> String {
        format!("{}/repos/{}/issues/{}/comments", self.api_url, self.repository, pr)
    }

    fn comment_url(&self, id: u64) -> String {
        format!("{}/repos/{}/issues/comments/{}", self.api_url, self.repository, id)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
    }

    fn check(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GithubError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GithubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Search all comment pages of `pr` for the marker.
    fn find_existing(&self, pr: u64) -> Result<Option<u64>, GithubError> {
        let url = self.comments_url(pr);
        let mut page = 1usize;
        loop {
            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&[("per_page", COMMENTS_PER_PAGE), ("page", page)])
                .send()?;
            let comments: Vec<IssueComment> = Self::check(response)?.json()?;

            if let Some(id) = find_marked_comment(&comments) {
                return Ok(Some(id));
            }
            if comments.len() < COMMENTS_PER_PAGE {
                return Ok(None);
            }
            page += 1;
        }
    }

    /// Create or update the coverage comment.
    pub fn upsert(&self, pr: u64, summary: &str, difference: &str) -> Result<(), GithubError> {
        let payload = comment_payload(summary, difference);
        let response = match self.find_existing(pr)? {
            Some(id) => self
                .request(reqwest::Method::PATCH, &self.comment_url(id))
                .json(&payload)
                .send()?,
            None => self
                .request(reqwest::Method::POST, &self.comments_url(pr))
                .json(&payload)
                .send()?,
        };
        Self::check(response)?;
        Ok(())
    }
}

impl CommentPoster for GithubCommentPoster {
    fn upsert_comment(&self, pr: u64, summary: &str, difference: &str) -> Result<(), String> {
        self.upsert(pr, summary, difference)
            .map_err(|e| e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    #[test]
    fn test_event_with_pull_request() {
        let event = r#"{
            "action": "synchronize",
            "number": 7,
            "pull_request": { "number": 7, "title": "Add billing", "head": { "sha": "abc" } }
        }"#;
        assert_eq!(pull_request_number_from_event(event).unwrap(), Some(7));
    }

    #[test]
    fn test_event_without_pull_request() {
        let event = r#"{ "ref": "refs/heads/main", "commits": [] }"#;
        assert_eq!(pull_request_number_from_event(event).unwrap(), None);
    }

    #[test]
    fn test_event_with_null_pull_request() {
        assert_eq!(
            pull_request_number_from_event(r#"{"pull_request": null}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_event_invalid_json() {
        assert!(matches!(
            pull_request_number_from_event("not json"),
            Err(GithubError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_event_source_without_path() {
        let source = GithubEventSource::new(None);
        assert_eq!(source.pull_request_number(), Ok(None));
    }

    #[test]
    fn test_event_source_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"pull_request":{"number":128}}"#).unwrap();

        let source = GithubEventSource::new(Some(path));
        assert_eq!(source.pull_request_number(), Ok(Some(128)));
    }

    #[test]
    fn test_event_source_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = GithubEventSource::new(Some(dir.path().join("missing.json")));

        let err = source.pull_request_number().unwrap_err();
        assert!(err.starts_with("Failed to read event payload"));
        assert!(err.contains("missing.json"));
    }

    #[test]
    fn test_static_pull_request() {
        assert_eq!(StaticPullRequest(5).pull_request_number(), Ok(Some(5)));
    }

    #[test]
    fn test_find_marked_comment() {
        let comments = vec![
            IssueComment {
                id: 1,
                body: Some("LGTM".to_string()),
            },
            IssueComment {
                id: 2,
                body: None,
            },
            IssueComment {
                id: 3,
                body: Some(format!("{}\n## Coverage Report", COMMENT_MARKER)),
            },
            IssueComment {
                id: 4,
                body: Some(COMMENT_MARKER.to_string()),
            },
        ];
        assert_eq!(find_marked_comment(&comments), Some(3));
        assert_eq!(find_marked_comment(&comments[..2]), None);
    }

    #[test]
    fn test_issue_comment_deserialize_ignores_extra_fields() {
        let json = r#"[{"id": 11, "body": "hi", "user": {"login": "bot"}, "created_at": "2024-01-01T00:00:00Z"}]"#;
        let comments: Vec<IssueComment> = serde_json::from_str(json).unwrap();
        assert_eq!(comments[0].id, 11);
        assert_eq!(comments[0].body.as_deref(), Some("hi"));
    }

    #[test]
    fn test_comment_payload_contains_marker_and_tables() {
        let payload = comment_payload("| a |", "No differences");
        let body = payload["body"].as_str().unwrap();
        assert!(body.starts_with(COMMENT_MARKER));
        assert!(body.contains("| a |"));
        assert!(body.contains("No differences"));
    }

    #[test]
    fn test_poster_rejects_bad_repository() {
        for repo in ["", "owner", "/name", "owner/", "a/b/c"] {
            assert!(
                matches!(
                    GithubCommentPoster::new(DEFAULT_API_URL, repo, "t"),
                    Err(GithubError::InvalidRepository(_))
                ),
                "{repo} should be rejected"
            );
        }
    }

    #[test]
    fn test_poster_urls() {
        let poster =
            GithubCommentPoster::new("https://ghe.example.com/api/v3/", "acme/shop", "t").unwrap();
        assert_eq!(
            poster.comments_url(9),
            "https://ghe.example.com/api/v3/repos/acme/shop/issues/9/comments"
        );
        assert_eq!(
            poster.comment_url(77),
            "https://ghe.example.com/api/v3/repos/acme/shop/issues/comments/77"
        );
    }

    // ------------------------------------------------------------------------
    // Upsert against a local HTTP stub
    // ------------------------------------------------------------------------

    #[derive(Debug)]
    struct Recorded {
        method: String,
        target: String,
        authorization: Option<String>,
        body: String,
    }

    /// Serve `responses` in order, one connection each, and hand back what
    /// was requested.
    fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let mut recorded = Vec::new();
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap().to_string();
                let target = parts.next().unwrap().to_string();

                let mut content_length = 0usize;
                let mut authorization = None;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        let value = value.trim().to_string();
                        match name.to_ascii_lowercase().as_str() {
                            "content-length" => content_length = value.parse().unwrap(),
                            "authorization" => authorization = Some(value),
                            _ => {}
                        }
                    }
                }

                let mut request_body = vec![0u8; content_length];
                reader.read_exact(&mut request_body).unwrap();

                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let mut stream = reader.into_inner();
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();

                recorded.push(Recorded {
                    method,
                    target,
                    authorization,
                    body: String::from_utf8(request_body).unwrap(),
                });
            }
            recorded
        });

        (url, handle)
    }

    fn stub_poster(url: &str) -> GithubCommentPoster {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .unwrap();
        GithubCommentPoster::with_client(client, url, "acme/shop", "secret").unwrap()
    }

    fn comments_page(ids: std::ops::RangeInclusive<u64>) -> String {
        let comments: Vec<serde_json::Value> = ids
            .map(|id| json!({ "id": id, "body": format!("comment {id}") }))
            .collect();
        serde_json::Value::Array(comments).to_string()
    }

    #[test]
    fn test_upsert_patches_marked_comment_on_second_page() {
        let second_page = json!([
            { "id": 101, "body": null },
            { "id": 555, "body": format!("{}\nold report", COMMENT_MARKER) }
        ])
        .to_string();
        let (url, server) = serve(vec![
            (200, comments_page(1..=100)),
            (200, second_page),
            (200, "{}".to_string()),
        ]);

        stub_poster(&url).upsert(9, "| s |", "| d |").unwrap();
        let requests = server.join().unwrap();

        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(
            requests[0].target,
            "/repos/acme/shop/issues/9/comments?per_page=100&page=1"
        );
        assert_eq!(
            requests[1].target,
            "/repos/acme/shop/issues/9/comments?per_page=100&page=2"
        );
        assert_eq!(requests[2].method, "PATCH");
        assert_eq!(requests[2].target, "/repos/acme/shop/issues/comments/555");
        assert_eq!(requests[2].authorization.as_deref(), Some("token secret"));

        let payload: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
        assert_eq!(payload, comment_payload("| s |", "| d |"));
    }

    #[test]
    fn test_upsert_posts_when_no_comment_is_marked() {
        let (url, server) = serve(vec![
            (200, comments_page(1..=3)),
            (201, json!({ "id": 900 }).to_string()),
        ]);

        stub_poster(&url).upsert(4, "| s |", "No differences").unwrap();
        let requests = server.join().unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].target,
            "/repos/acme/shop/issues/4/comments?per_page=100&page=1"
        );
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].target, "/repos/acme/shop/issues/4/comments");
        assert!(requests[1].body.contains("No differences"));
    }

    #[test]
    fn test_upsert_maps_error_status() {
        let (url, server) = serve(vec![(
            403,
            r#"{"message":"Resource not accessible by integration"}"#.to_string(),
        )]);

        let err = stub_poster(&url).upsert(4, "| s |", "| d |").unwrap_err();
        let requests = server.join().unwrap();

        assert_eq!(requests.len(), 1);
        match err {
            GithubError::Api { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("Resource not accessible by integration"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_upsert_comment_reports_failed_post() {
        let (url, server) = serve(vec![
            (200, "[]".to_string()),
            (422, r#"{"message":"Validation Failed"}"#.to_string()),
        ]);

        let err = stub_poster(&url)
            .upsert_comment(4, "| s |", "| d |")
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(
            err,
            r#"GitHub API request failed: 422 - {"message":"Validation Failed"}"#
        );
    }
}
