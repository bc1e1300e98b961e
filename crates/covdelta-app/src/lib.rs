//! Application orchestration for covdelta.
//!
//! This crate provides the high-level `run` function that orchestrates the
//! coverage comparison for a pull request:
//!
//! 1. Detect the pull request (no PR means nothing to do)
//! 2. Load both `.last_run.json` and both `.resultset.json` reports
//! 3. Summarize and diff the per-file coverage
//! 4. Post (or update) the coverage comment
//! 5. Gate on the base coverage threshold
//!
//! # Example
//!
//! ```rust,ignore
//! use covdelta_app::{CompareRequest, SystemClock, run};
//! use covdelta_adapters_repo::FsReportReader;
//! use covdelta_adapters_github::{GithubCommentPoster, StaticPullRequest};
//!
//! let request = CompareRequest { threshold: 80, ..Default::default() };
//! let poster = GithubCommentPoster::new("https://api.github.com", "acme/shop", "token")?;
//! let outcome = run(
//!     &request,
//!     &FsReportReader::new("."),
//!     &StaticPullRequest(42),
//!     &poster,
//!     &SystemClock,
//! )?;
//! std::process::exit(outcome.exit_code());
//! ```

use covdelta_adapters_coverage::{
    DEFAULT_SUITE, LAST_RUN_FILE, RESULTSET_FILE, SimplecovError, parse_last_run, parse_resultset,
};
use covdelta_config::EffectiveConfig;
pub use covdelta_domain::ZeroCoverage;
use covdelta_domain::{diff_snapshots, is_below_threshold, summarize, threshold_message};
pub use covdelta_ports::Clock;
use covdelta_ports::{CommentPoster, PullRequestSource, ReportReader};
use covdelta_render::{render_comment_body, render_difference_table, render_summary_table};
use covdelta_types::{
    FileLineHits, Inputs, REASON_ABOVE_THRESHOLD, REASON_BELOW_THRESHOLD, Report, ReportData, Run,
    SCHEMA_ID, Side, Tool, Verdict, VerdictStatus,
};
use thiserror::Error;

/// Default directory of the base branch reports.
pub const DEFAULT_BASE_DIR: &str = covdelta_config::DEFAULT_BASE_DIR;

/// Default directory of the head branch reports.
pub const DEFAULT_HEAD_DIR: &str = covdelta_config::DEFAULT_HEAD_DIR;

/// Message used when the run has no pull request context.
pub const NO_PULL_REQUEST_MESSAGE: &str = "Cannot find the pull request";

// ============================================================================
// Clock
// ============================================================================

/// System clock implementation that returns the actual current time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

// ============================================================================
// Request and Result Types
// ============================================================================

/// Request for a base/head coverage comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareRequest {
    /// Workspace-relative directory of the base SimpleCov output.
    pub base_dir: String,
    /// Workspace-relative directory of the head SimpleCov output.
    pub head_dir: String,
    /// Resultset suite key.
    pub suite: String,
    /// Minimum acceptable base coverage percentage.
    pub threshold: u32,
    /// How 0% values are displayed in the difference table.
    pub zero_coverage: ZeroCoverage,
}

impl Default for CompareRequest {
    fn default() -> Self {
        Self {
            base_dir: DEFAULT_BASE_DIR.to_string(),
            head_dir: DEFAULT_HEAD_DIR.to_string(),
            suite: DEFAULT_SUITE.to_string(),
            threshold: 0,
            zero_coverage: ZeroCoverage::Absent,
        }
    }
}

impl CompareRequest {
    /// Build a request from resolved configuration.
    pub fn from_config(config: &EffectiveConfig) -> Self {
        let zero_coverage = match config.zero_coverage {
            covdelta_config::ZeroCoverage::Absent => ZeroCoverage::Absent,
            covdelta_config::ZeroCoverage::Value => ZeroCoverage::Value,
        };

        Self {
            base_dir: config.base_dir.clone(),
            head_dir: config.head_dir.clone(),
            suite: config.suite.clone(),
            threshold: config.threshold,
            zero_coverage,
        }
    }

    fn dir(&self, side: Side) -> &str {
        match side {
            Side::Base => &self.base_dir,
            Side::Head => &self.head_dir,
        }
    }

    /// Workspace-relative path of the `.last_run.json` for `side`.
    pub fn last_run_path(&self, side: Side) -> String {
        join_report_path(self.dir(side), LAST_RUN_FILE)
    }

    /// Workspace-relative path of the `.resultset.json` for `side`.
    pub fn resultset_path(&self, side: Side) -> String {
        join_report_path(self.dir(side), RESULTSET_FILE)
    }

    fn inputs(&self) -> Inputs {
        Inputs {
            base_last_run: self.last_run_path(Side::Base),
            head_last_run: self.last_run_path(Side::Head),
            base_resultset: self.resultset_path(Side::Base),
            head_resultset: self.resultset_path(Side::Head),
            suite: self.suite.clone(),
        }
    }
}

fn join_report_path(dir: &str, file: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

/// Result of a comparison.
#[derive(Debug, Clone)]
pub struct CompareResult {
    /// The `covdelta.report.v1` report.
    pub report: Report,
    /// Rendered base/head/threshold table.
    pub summary_table: String,
    /// Rendered per-file difference table (or `No differences`).
    pub difference_table: String,
    /// Full comment body as posted to the pull request.
    pub markdown: String,
    /// Exit code for the CLI.
    /// - 0: base coverage meets the threshold
    /// - 2: base coverage below the threshold
    pub exit_code: i32,
}

impl CompareResult {
    /// The threshold failure message, when the base coverage is below it.
    pub fn gate_message(&self) -> Option<String> {
        let data = &self.report.data;
        is_below_threshold(data.base_pct, data.threshold_pct)
            .then(|| threshold_message(data.threshold_pct, data.base_pct))
    }
}

/// What a full [`run`] ended with.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run has no pull request context; nothing was read or posted.
    NoPullRequest,
    /// The comment was posted and the base coverage meets the threshold.
    Passed(CompareResult),
    /// The comment was posted but the base coverage is below the threshold.
    BelowThreshold {
        result: CompareResult,
        message: String,
    },
}

impl RunOutcome {
    /// Exit code for the CLI: 0 for pass or no PR, 2 for a threshold failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NoPullRequest | RunOutcome::Passed(_) => 0,
            RunOutcome::BelowThreshold { .. } => 2,
        }
    }

    /// The comparison result, when one was produced.
    pub fn result(&self) -> Option<&CompareResult> {
        match self {
            RunOutcome::NoPullRequest => None,
            RunOutcome::Passed(result) | RunOutcome::BelowThreshold { result, .. } => Some(result),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum AppError {
    /// A report file could not be read.
    #[error("Failed to read {side} report {path}: {message}")]
    ReportRead {
        side: Side,
        path: String,
        message: String,
    },

    /// A report file could not be decoded.
    #[error("Failed to parse {side} report {path}: {source}")]
    ReportParse {
        side: Side,
        path: String,
        #[source]
        source: SimplecovError,
    },

    /// The pull request context could not be determined.
    #[error("Failed to detect pull request: {0}")]
    PullRequest(String),

    /// The coverage comment could not be posted.
    #[error("Failed to post comment: {0}")]
    CommentPost(String),
}

// ============================================================================
// Comparison
// ============================================================================

fn read_side<R: ReportReader>(reader: &R, side: Side, path: String) -> Result<(String, String), AppError> {
    match reader.read_report(&path) {
        Ok(text) => Ok((path, text)),
        Err(message) => Err(AppError::ReportRead {
            side,
            path,
            message,
        }),
    }
}

fn load_last_run<R: ReportReader>(
    reader: &R,
    request: &CompareRequest,
    side: Side,
) -> Result<f64, AppError> {
    let (path, text) = read_side(reader, side, request.last_run_path(side))?;
    parse_last_run(&text).map_err(|source| AppError::ReportParse { side, path, source })
}

fn load_resultset<R: ReportReader>(
    reader: &R,
    request: &CompareRequest,
    side: Side,
) -> Result<FileLineHits, AppError> {
    let (path, text) = read_side(reader, side, request.resultset_path(side))?;
    parse_resultset(&text, &request.suite)
        .map_err(|source| AppError::ReportParse { side, path, source })
}

fn format_timestamp(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn build_run(
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: chrono::DateTime<chrono::Utc>,
) -> Run {
    Run {
        started_at: format_timestamp(started_at),
        ended_at: Some(format_timestamp(ended_at)),
        duration_ms: Some((ended_at - started_at).num_milliseconds().max(0) as u64),
    }
}

/// Load, summarize, diff and render a comparison.
///
/// Reports are read in the order base last run, head last run, base
/// resultset, head resultset; the first failure aborts.
pub fn build_comparison<R: ReportReader, C: Clock>(
    request: &CompareRequest,
    reader: &R,
    clock: &C,
) -> Result<CompareResult, AppError> {
    let started_at = clock.now();

    let base_pct = load_last_run(reader, request, Side::Base)?;
    let head_pct = load_last_run(reader, request, Side::Head)?;
    let base_hits = load_resultset(reader, request, Side::Base)?;
    let head_hits = load_resultset(reader, request, Side::Head)?;

    let base_snapshot = summarize(&base_hits);
    let head_snapshot = summarize(&head_hits);
    let differences = diff_snapshots(&base_snapshot, &head_snapshot, request.zero_coverage);

    let summary_table = render_summary_table(base_pct, head_pct, request.threshold);
    let difference_table = render_difference_table(&differences);
    let markdown = render_comment_body(&summary_table, &difference_table);

    let verdict = if is_below_threshold(base_pct, request.threshold) {
        Verdict {
            status: VerdictStatus::Fail,
            reasons: vec![REASON_BELOW_THRESHOLD.to_string()],
        }
    } else {
        Verdict {
            status: VerdictStatus::Pass,
            reasons: vec![REASON_ABOVE_THRESHOLD.to_string()],
        }
    };

    let exit_code = match verdict.status {
        VerdictStatus::Pass => 0,
        VerdictStatus::Fail => 2,
    };

    let report = Report {
        schema: SCHEMA_ID.to_string(),
        tool: Tool::default(),
        run: build_run(started_at, clock.now()),
        verdict,
        data: ReportData {
            base_pct,
            head_pct,
            threshold_pct: request.threshold,
            base_files: base_hits.len() as u32,
            head_files: head_hits.len() as u32,
            differences,
            inputs: request.inputs(),
        },
    };

    Ok(CompareResult {
        report,
        summary_table,
        difference_table,
        markdown,
        exit_code,
    })
}

// ============================================================================
// Main Run Function
// ============================================================================

/// Run the full pull request flow.
///
/// # Returns
///
/// - `Ok(RunOutcome::NoPullRequest)` when there is no PR context
/// - `Ok(RunOutcome::Passed)` when the comment was posted and the gate passed
/// - `Ok(RunOutcome::BelowThreshold)` when the comment was posted and the
///   base coverage is below the threshold
///
/// # Errors
///
/// Returns `AppError` when PR detection, report loading or posting fails.
/// Nothing is posted when loading fails.
pub fn run<R, P, W, C>(
    request: &CompareRequest,
    reader: &R,
    pr_source: &P,
    poster: &W,
    clock: &C,
) -> Result<RunOutcome, AppError>
where
    R: ReportReader,
    P: PullRequestSource,
    W: CommentPoster,
    C: Clock,
{
    let Some(pr) = pr_source
        .pull_request_number()
        .map_err(AppError::PullRequest)?
    else {
        return Ok(RunOutcome::NoPullRequest);
    };

    let result = build_comparison(request, reader, clock)?;

    poster
        .upsert_comment(pr, &result.summary_table, &result.difference_table)
        .map_err(AppError::CommentPost)?;

    if let Some(message) = result.gate_message() {
        return Ok(RunOutcome::BelowThreshold { result, message });
    }

    Ok(RunOutcome::Passed(result))
}

// ============================================================================
// Tests
// ============================================================================
