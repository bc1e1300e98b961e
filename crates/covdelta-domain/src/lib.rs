//! Pure domain logic for covdelta.
//!
//! This crate implements the comparison core with no side effects:
//! per-file line coverage percentages, snapshot summaries, the sorted
//! difference between two snapshots and the threshold gate.

use std::collections::BTreeSet;

use covdelta_types::{
    ChangeKind, CoverageSnapshot, DifferenceEntry, FileLineHits, format_pct,
};

// ============================================================================
// Policy
// ============================================================================

/// How a coverage value of exactly `0` is displayed in status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroCoverage {
    /// Treat `0` like a missing value: a file dropping to 0% reads `DELETE`
    /// and a new file at 0% gets an empty status.
    #[default]
    Absent,
    /// Show `0` like any other value: `0% (-50%)`, `NEW 0%`.
    Value,
}

impl ZeroCoverage {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZeroCoverage::Absent => "absent",
            ZeroCoverage::Value => "value",
        }
    }

    /// Whether `value` counts as present when building a status string.
    fn shows(&self, value: Option<f64>) -> bool {
        match (self, value) {
            (_, None) => false,
            (ZeroCoverage::Absent, Some(v)) => v != 0.0,
            (ZeroCoverage::Value, Some(_)) => true,
        }
    }
}

// ============================================================================
// Percentage Calculator
// ============================================================================

/// Truncate `value` to `precision` decimal places (floor, not round).
///
/// # Examples
///
/// ```
/// use covdelta_domain::floor_precised;
///
/// assert_eq!(floor_precised(66.666, 2), 66.66);
/// assert_eq!(floor_precised(99.999, 2), 99.99);
/// ```
pub fn floor_precised(value: f64, precision: i32) -> f64 {
    let power = 10f64.powi(precision);
    (value * power).floor() / power
}

/// Calculate the line coverage percentage of one file.
///
/// `None` entries are not instrumented and are skipped. A file without any
/// instrumented line is fully covered (100).
///
/// # Examples
///
/// ```
/// use covdelta_domain::line_coverage_pct;
///
/// assert_eq!(line_coverage_pct(&[None, Some(1), Some(0), Some(2), None]), 66.66);
/// assert_eq!(line_coverage_pct(&[]), 100.0);
/// ```
pub fn line_coverage_pct(lines: &[Option<u64>]) -> f64 {
    let (total, covered) = lines
        .iter()
        .flatten()
        .fold((0u64, 0u64), |(total, covered), &hits| {
            (total + 1, covered + u64::from(hits > 0))
        });

    if total == 0 {
        return 100.0;
    }

    floor_precised((covered as f64 / total as f64) * 100.0, 2)
}

// ============================================================================
// Snapshot Summarizer
// ============================================================================

/// Summarize per-file line hits into a coverage snapshot.
pub fn summarize(files: &FileLineHits) -> CoverageSnapshot {
    files
        .iter()
        .map(|(path, lines)| (path.clone(), line_coverage_pct(lines)))
        .collect()
}

// ============================================================================
// Snapshot Differ
// ============================================================================

/// Render the status cell for a file moving from `from` to `to`.
///
/// - ` {to}%` is appended when `to` is shown
/// - ` ({to - from}%)` is appended when both are shown
/// - `NEW` prefixes a file that only `to` shows, `DELETE` one that only `from` shows
///
/// # Examples
///
/// ```
/// use covdelta_domain::{ZeroCoverage, format_status};
///
/// assert_eq!(format_status(Some(50.0), Some(75.0), ZeroCoverage::Absent), "75% (25%)");
/// assert_eq!(format_status(None, Some(70.0), ZeroCoverage::Absent), "NEW 70%");
/// assert_eq!(format_status(Some(80.0), None, ZeroCoverage::Absent), "DELETE");
/// ```
pub fn format_status(from: Option<f64>, to: Option<f64>, zero: ZeroCoverage) -> String {
    let from_shown = zero.shows(from);
    let to_shown = zero.shows(to);

    let mut parts: Vec<String> = Vec::with_capacity(3);

    if !from_shown && to_shown {
        parts.push("NEW".to_string());
    }
    if from_shown && !to_shown {
        parts.push("DELETE".to_string());
    }

    if let Some(to) = to.filter(|_| to_shown) {
        parts.push(format!("{}%", format_pct(to)));

        if let Some(from) = from.filter(|_| from_shown) {
            parts.push(format!("({}%)", format_pct(to - from)));
        }
    }

    parts.join(" ")
}

/// Compute the files whose coverage differs between `base` and `head`.
///
/// Entries are sorted ascending by filename. Files with equal values on both
/// sides are omitted; files present on one side only are always included.
pub fn diff_snapshots(
    base: &CoverageSnapshot,
    head: &CoverageSnapshot,
    zero: ZeroCoverage,
) -> Vec<DifferenceEntry> {
    let paths: BTreeSet<&str> = base
        .keys()
        .chain(head.keys())
        .map(String::as_str)
        .collect();

    paths
        .into_iter()
        .filter_map(|path| {
            let from = base.get(path).copied();
            let to = head.get(path).copied();

            if from == to {
                return None;
            }

            let change = match (from, to) {
                (None, _) => ChangeKind::Added,
                (_, None) => ChangeKind::Removed,
                _ => ChangeKind::Changed,
            };

            Some(DifferenceEntry {
                path: path.to_string(),
                base_pct: from,
                head_pct: to,
                change,
                lines: format_status(from, to, zero),
            })
        })
        .collect()
}

// ============================================================================
// Threshold Gate
// ============================================================================

/// Whether the base coverage is below the configured threshold.
pub fn is_below_threshold(base_pct: f64, threshold: u32) -> bool {
    base_pct < f64::from(threshold)
}

/// Failure message for a base coverage below `threshold`.
///
/// # Examples
///
/// ```
/// use covdelta_domain::threshold_message;
///
/// assert_eq!(threshold_message(90, 85.0), "Coverage is less than 90%. (85%)");
/// ```
pub fn threshold_message(threshold: u32, base_pct: f64) -> String {
    format!(
        "Coverage is less than {}%. ({}%)",
        threshold,
        format_pct(base_pct)
    )
}

// ============================================================================
// Tests
// ============================================================================
