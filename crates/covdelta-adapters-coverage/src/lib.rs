//! SimpleCov report decoder for covdelta.
//!
//! This crate decodes the two JSON files SimpleCov leaves in its coverage
//! directory:
//! - `.last_run.json`, holding the overall line coverage of the run
//! - `.resultset.json`, holding per-file line hits for each test suite
//!
//! Shapes and numeric ranges are validated here, so the domain layer only
//! ever sees well-formed data.

use std::collections::BTreeMap;

use covdelta_types::FileLineHits;
use serde::Deserialize;
use thiserror::Error;

pub use covdelta_types::DEFAULT_SUITE;

/// File name of the overall run summary.
pub const LAST_RUN_FILE: &str = ".last_run.json";

/// File name of the per-file line hit data.
pub const RESULTSET_FILE: &str = ".resultset.json";

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while decoding SimpleCov reports.
#[derive(Debug, Error, PartialEq)]
pub enum SimplecovError {
    /// `.last_run.json` did not match `{ "result": { "line": <number> } }`.
    #[error("Invalid last run format: {0}")]
    InvalidLastRun(String),

    /// `.resultset.json` did not match the suite/coverage/lines layout.
    #[error("Invalid resultset format: {0}")]
    InvalidResultset(String),

    /// The requested suite key is not present in the resultset.
    #[error("Resultset has no \"{suite}\" suite (found: {found})")]
    MissingSuite { suite: String, found: String },

    /// The overall line coverage lies outside 0-100.
    #[error("Line coverage must be between 0 and 100, got {0}")]
    PercentOutOfRange(f64),
}

// ============================================================================
// Schema
// ============================================================================

/// Decoded `.last_run.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LastRun {
    pub result: LastRunResult,
}

/// The `result` object of `.last_run.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LastRunResult {
    /// Overall line coverage percentage.
    pub line: f64,
    /// Overall branch coverage, present when branch coverage is enabled.
    #[serde(default)]
    pub branch: Option<f64>,
}

/// Top level of `.resultset.json`: suite name to the still undecoded suite
/// results. Only the selected suite is decoded into [`ResultsetSuite`].
pub type Resultset = BTreeMap<String, serde_json::Value>;

/// Results of one test suite.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultsetSuite {
    pub coverage: BTreeMap<String, FileCoverage>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Coverage of a single source file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileCoverage {
    /// One entry per source line; `null` for lines that are not relevant.
    pub lines: Vec<Option<u64>>,
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode `.last_run.json` and return the overall line coverage.
///
/// # Examples
///
/// ```
/// use covdelta_adapters_coverage::parse_last_run;
///
/// assert_eq!(parse_last_run(r#"{"result": {"line": 85.5}}"#).unwrap(), 85.5);
/// assert!(parse_last_run(r#"{"result": {}}"#).is_err());
/// ```
pub fn parse_last_run(text: &str) -> Result<f64, SimplecovError> {
    let last_run: LastRun = serde_json::from_str(text)
        .map_err(|e| SimplecovError::InvalidLastRun(e.to_string()))?;

    let line = last_run.result.line;
    if !(0.0..=100.0).contains(&line) {
        return Err(SimplecovError::PercentOutOfRange(line));
    }

    Ok(line)
}

/// Decode `.resultset.json` into the line hits of one suite.
///
/// # Examples
///
/// ```
/// use covdelta_adapters_coverage::parse_resultset;
///
/// let json = r#"{"RSpec": {"coverage": {"lib/a.rb": {"lines": [null, 1, 0]}}}}"#;
/// let files = parse_resultset(json, "RSpec").unwrap();
///
/// assert_eq!(files["lib/a.rb"], vec![None, Some(1), Some(0)]);
/// ```
pub fn parse_resultset(text: &str, suite: &str) -> Result<FileLineHits, SimplecovError> {
    let mut resultset: Resultset = serde_json::from_str(text)
        .map_err(|e| SimplecovError::InvalidResultset(e.to_string()))?;

    let Some(raw_suite) = resultset.remove(suite) else {
        let found: Vec<&str> = resultset.keys().map(String::as_str).collect();
        return Err(SimplecovError::MissingSuite {
            suite: suite.to_string(),
            found: if found.is_empty() {
                "none".to_string()
            } else {
                found.join(", ")
            },
        });
    };

    let suite_result: ResultsetSuite = serde_json::from_value(raw_suite)
        .map_err(|e| SimplecovError::InvalidResultset(e.to_string()))?;

    Ok(suite_result
        .coverage
        .into_iter()
        .map(|(path, file)| (path, file.lines))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================



// ============================================================================
// Integration Tests (with actual fixture files)
// ============================================================================
