//! Rendering utilities for covdelta.
//!
//! This crate turns comparison results into text:
//! - the summary table (base, head, threshold)
//! - the per-file difference table
//! - the pull request comment body
//! - GitHub workflow commands for warnings and failures
//!
//! # Example
//!
//! ```rust
//! use covdelta_render::{render_comment_body, render_difference_table, render_summary_table};
//!
//! let summary = render_summary_table(85.0, 82.0, 90);
//! let difference = render_difference_table(&[]);
//! let body = render_comment_body(&summary, &difference);
//!
//! assert!(body.contains("| 85%           | 82%           | 90%       |"));
//! assert!(body.contains("No differences"));
//! ```

use covdelta_types::{DifferenceEntry, format_pct};

/// Hidden marker identifying the covdelta comment on a pull request.
pub const COMMENT_MARKER: &str = "<!-- covdelta -->";

/// Rendered in place of the difference table when nothing changed.
pub const NO_DIFFERENCES: &str = "No differences";

/// Header of the summary table.
pub const SUMMARY_HEADER: [&str; 3] = ["Base Coverage", "Head Coverage", "Threshold"];

/// Header of the difference table.
pub const DIFFERENCE_HEADER: [&str; 2] = ["Filename", "Lines"];

const MIN_COLUMN_WIDTH: usize = 3;

// ============================================================================
// Tables
// ============================================================================

/// Render rows as an aligned markdown table. The first row is the header.
///
/// Every column is padded to its widest cell and the delimiter row uses
/// dashes of the same width. Pipes inside cells are escaped.
///
/// # Examples
///
/// ```rust
/// use covdelta_render::render_markdown_table;
///
/// let table = render_markdown_table(&[
///     vec!["Filename".to_string(), "Lines".to_string()],
///     vec!["x".to_string(), "75% (25%)".to_string()],
/// ]);
///
/// assert_eq!(
///     table,
///     "| Filename | Lines     |\n| -------- | --------- |\n| x        | 75% (25%) |"
/// );
/// ```
pub fn render_markdown_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            (0..columns)
                .map(|i| row.get(i).map(|cell| cell.replace('|', "\\|")).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths = vec![MIN_COLUMN_WIDTH; columns];
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render_row = |row: &[String]| -> String {
        let padded: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width - cell.chars().count();
                format!("{}{}", cell, " ".repeat(pad))
            })
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(render_row(&cells[0]));

    let delimiters: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    lines.push(format!("| {} |", delimiters.join(" | ")));

    for row in &cells[1..] {
        lines.push(render_row(row));
    }

    lines.join("\n")
}

/// Render the base/head/threshold summary table.
pub fn render_summary_table(base_pct: f64, head_pct: f64, threshold: u32) -> String {
    render_markdown_table(&[
        SUMMARY_HEADER.iter().map(|h| h.to_string()).collect(),
        vec![
            format!("{}%", format_pct(base_pct)),
            format!("{}%", format_pct(head_pct)),
            format!("{}%", threshold),
        ],
    ])
}

/// Render the per-file difference table, or `No differences` when empty.
pub fn render_difference_table(entries: &[DifferenceEntry]) -> String {
    if entries.is_empty() {
        return NO_DIFFERENCES.to_string();
    }

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(entries.len() + 1);
    rows.push(DIFFERENCE_HEADER.iter().map(|h| h.to_string()).collect());
    rows.extend(
        entries
            .iter()
            .map(|entry| vec![entry.path.clone(), entry.lines.clone()]),
    );

    render_markdown_table(&rows)
}

// ============================================================================
// Comment
// ============================================================================

/// Render the pull request comment body from the two tables.
///
/// The body starts with [`COMMENT_MARKER`] so later runs can find and
/// update the same comment.
pub fn render_comment_body(summary: &str, difference: &str) -> String {
    let mut output = String::new();

    output.push_str(COMMENT_MARKER);
    output.push('\n');
    output.push_str("## Coverage Report\n\n");
    output.push_str(summary);
    output.push_str("\n\n### Changed Files\n\n");
    output.push_str(difference);
    output.push('\n');

    output
}

// ============================================================================
// Workflow Commands
// ============================================================================

/// Render a GitHub workflow `error` command that fails the step.
///
/// # Examples
///
/// ```rust
/// use covdelta_render::render_error_command;
///
/// assert_eq!(
///     render_error_command("Coverage is less than 90%. (85%)"),
///     "::error::Coverage is less than 90%25. (85%25)"
/// );
/// ```
pub fn render_error_command(message: &str) -> String {
    format!("::error::{}", escape_command_data(message))
}

/// Render a GitHub workflow `warning` command.
pub fn render_warning_command(message: &str) -> String {
    format!("::warning::{}", escape_command_data(message))
}

/// Escape command data the way the Actions runner expects.
fn escape_command_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

// ============================================================================
// Tests
// ============================================================================
