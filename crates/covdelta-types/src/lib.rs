//! Core types and DTOs for covdelta.
//!
//! This crate defines the data transfer objects shared across covdelta:
//! line-hit maps, coverage snapshots, difference entries and the
//! `covdelta.report.v1` report schema.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Schema and Reason Constants
// ============================================================================

/// Schema identifier for the covdelta report format.
pub const SCHEMA_ID: &str = "covdelta.report.v1";

/// Resultset suite key SimpleCov uses for RSpec runs.
pub const DEFAULT_SUITE: &str = "RSpec";

/// Reason: base coverage meets the configured threshold.
pub const REASON_ABOVE_THRESHOLD: &str = "above_threshold";

/// Reason: base coverage is below the configured threshold.
pub const REASON_BELOW_THRESHOLD: &str = "below_threshold";

// ============================================================================
// Coverage Maps
// ============================================================================

/// Per-file line hits, keyed by filename as it appears in the resultset.
///
/// `None` marks a line that is not instrumented; `Some(n)` is a hit count.
pub type FileLineHits = BTreeMap<String, Vec<Option<u64>>>;

/// Per-file coverage percentage (0-100, truncated to two decimals).
pub type CoverageSnapshot = BTreeMap<String, f64>;

// ============================================================================
// Enums
// ============================================================================

/// Which side of the comparison a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The target branch run.
    Base,
    /// The pull request run.
    Head,
}

impl Side {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Base => "base",
            Side::Head => "head",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a file's coverage changed between the two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the head snapshot.
    Added,
    /// Present only in the base snapshot.
    Removed,
    /// Present in both with different percentages.
    Changed,
}

/// Status of the overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

// ============================================================================
// Percent Formatting
// ============================================================================

/// Format a percentage value the way it appears in comment tables.
///
/// Uses the shortest decimal representation that round-trips, so whole
/// numbers carry no fractional part.
///
/// # Examples
///
/// ```
/// use covdelta_types::format_pct;
///
/// assert_eq!(format_pct(85.0), "85");
/// assert_eq!(format_pct(66.66), "66.66");
/// assert_eq!(format_pct(-12.5), "-12.5");
/// ```
pub fn format_pct(value: f64) -> String {
    if value == 0.0 {
        // Collapse -0 to 0.
        return "0".to_string();
    }
    format!("{}", value)
}

// ============================================================================
// Structs
// ============================================================================

/// A single file whose coverage differs between base and head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceEntry {
    /// Filename as keyed in the resultsets.
    pub path: String,
    /// Base percentage, absent when the file is new.
    pub base_pct: Option<f64>,
    /// Head percentage, absent when the file was removed.
    pub head_pct: Option<f64>,
    /// Kind of change, derived from presence on each side.
    pub change: ChangeKind,
    /// Rendered status cell, e.g. `NEW 70%`, `DELETE` or `75% (25%)`.
    pub lines: String,
}

/// Information about the tool that generated the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool.
    pub name: String,
    /// Version of the tool.
    pub version: String,
}

impl Default for Tool {
    fn default() -> Self {
        Self {
            name: "covdelta".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Information about the run timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// ISO 8601 timestamp when the run started.
    pub started_at: String,
    /// ISO 8601 timestamp when the run ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Duration of the run in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            started_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ended_at: None,
            duration_ms: None,
        }
    }
}

/// The overall verdict of the threshold gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Overall status of the gate.
    pub status: VerdictStatus,
    /// Reason tokens for the verdict.
    pub reasons: Vec<String>,
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            status: VerdictStatus::Pass,
            reasons: Vec::new(),
        }
    }
}

/// Paths of the reports that were compared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inputs {
    pub base_last_run: String,
    pub head_last_run: String,
    pub base_resultset: String,
    pub head_resultset: String,
    /// Resultset suite key (e.g. `RSpec`).
    pub suite: String,
}

/// Comparison data carried by the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportData {
    /// Overall base line coverage from `.last_run.json`.
    pub base_pct: f64,
    /// Overall head line coverage from `.last_run.json`.
    pub head_pct: f64,
    /// Minimum acceptable base coverage.
    pub threshold_pct: u32,
    /// Number of files in the base resultset.
    pub base_files: u32,
    /// Number of files in the head resultset.
    pub head_files: u32,
    /// Files whose coverage changed, sorted by path.
    pub differences: Vec<DifferenceEntry>,
    pub inputs: Inputs,
}

/// The full covdelta report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Schema identifier.
    pub schema: String,
    pub tool: Tool,
    pub run: Run,
    pub verdict: Verdict,
    pub data: ReportData,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            schema: SCHEMA_ID.to_string(),
            tool: Tool::default(),
            run: Run::default(),
            verdict: Verdict::default(),
            data: ReportData::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
