//! Shared port traits for covdelta's hexagonal architecture.
//!
//! Adapters implement these traits; the application layer only talks to them.

/// Port for reading report files relative to the workspace root.
pub trait ReportReader {
    /// Read the full contents of the report at the workspace-relative `path`.
    fn read_report(&self, path: &str) -> Result<String, String>;
}

/// Port for discovering the pull request being checked.
pub trait PullRequestSource {
    /// Returns the pull request number, or `None` when the run has no PR context.
    fn pull_request_number(&self) -> Result<Option<u64>, String>;
}

/// Port for publishing the coverage comment on a pull request.
///
/// Implementations create the comment on first use and update the same
/// comment on later runs.
pub trait CommentPoster {
    /// Create or update the coverage comment on pull request `pr`.
    fn upsert_comment(&self, pr: u64, summary: &str, difference: &str) -> Result<(), String>;
}

/// Port for obtaining the current UTC time.
pub trait Clock {
    /// Returns the current time in UTC.
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}
