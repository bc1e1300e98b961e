//! Configuration parsing and management for covdelta.
//!
//! This crate provides:
//! - Configuration types (`Config`, `ReportsConfig`, `ZeroCoverage`)
//! - TOML parsing and discovery of `covdelta.toml`
//! - Threshold parsing (base-10 integer percentage)
//! - Precedence handling (CLI > config file > defaults)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = "covdelta.toml";

/// Default directory holding the base branch SimpleCov output.
pub const DEFAULT_BASE_DIR: &str = "base-coverage-reports";

/// Default directory holding the head branch SimpleCov output.
pub const DEFAULT_HEAD_DIR: &str = "head-coverage-reports";

pub use covdelta_types::DEFAULT_SUITE;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    /// No threshold was configured anywhere.
    #[error("A coverage threshold is required (set --threshold, INPUT_THRESHOLD or `threshold` in covdelta.toml)")]
    MissingThreshold,
}

// ============================================================================
// Configuration Types
// ============================================================================

/// How a coverage value of exactly 0 is shown in the difference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroCoverage {
    /// Show 0% like a missing value (`DELETE`, empty status).
    #[default]
    Absent,
    /// Show 0% as a value (`0% (-50%)`, `NEW 0%`).
    Value,
}

/// Report location configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportsConfig {
    /// Workspace-relative directory of the base SimpleCov output.
    #[serde(default)]
    pub base_dir: Option<String>,
    /// Workspace-relative directory of the head SimpleCov output.
    #[serde(default)]
    pub head_dir: Option<String>,
    /// Resultset suite key to read.
    #[serde(default)]
    pub suite: Option<String>,
}

/// Full configuration for covdelta.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Minimum acceptable base coverage percentage (0-100).
    #[serde(default)]
    pub threshold: Option<u32>,

    /// How 0% values are displayed.
    #[serde(default)]
    pub zero_coverage: Option<ZeroCoverage>,

    /// Report location configuration.
    #[serde(default)]
    pub reports: ReportsConfig,
}

// ============================================================================
// Effective Configuration
// ============================================================================

/// Effective configuration with all values resolved.
///
/// This represents the final configuration after applying:
/// 1. Defaults
/// 2. Config file values
/// 3. CLI overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub threshold: u32,
    pub zero_coverage: ZeroCoverage,
    pub base_dir: String,
    pub head_dir: String,
    pub suite: String,
}

// ============================================================================
// Configuration Loading
// ============================================================================

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let Some(threshold) = config.threshold {
        validate_threshold(threshold)?;
    }

    let reports = &config.reports;
    for (key, value) in [
        ("reports.base_dir", &reports.base_dir),
        ("reports.head_dir", &reports.head_dir),
        ("reports.suite", &reports.suite),
    ] {
        if let Some(value) = value
            && value.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue(format!(
                "{} must not be empty",
                key
            )));
        }
    }

    Ok(())
}

fn validate_threshold(threshold: u32) -> Result<u32, ConfigError> {
    if threshold > 100 {
        return Err(ConfigError::InvalidValue(format!(
            "threshold must be between 0 and 100, got {}",
            threshold
        )));
    }
    Ok(threshold)
}

/// Parse a threshold given as text (CLI flag or action input).
///
/// The value must be a base-10 integer between 0 and 100; surrounding
/// whitespace is ignored.
///
/// # Examples
///
/// ```
/// use covdelta_config::parse_threshold;
///
/// assert_eq!(parse_threshold("90").unwrap(), 90);
/// assert_eq!(parse_threshold(" 075 ").unwrap(), 75);
/// assert!(parse_threshold("90%").is_err());
/// assert!(parse_threshold("0x10").is_err());
/// ```
pub fn parse_threshold(text: &str) -> Result<u32, ConfigError> {
    let trimmed = text.trim();
    let threshold: u32 = trimmed.parse().map_err(|_| {
        ConfigError::InvalidValue(format!(
            "threshold must be a base-10 integer, got '{}'",
            trimmed
        ))
    })?;
    validate_threshold(threshold)
}

/// Try to find and load configuration starting at `start`.
///
/// Searches for `covdelta.toml` in `start` and its parent directories.
/// `start` is canonicalized first so a relative path such as `.` still
/// reaches its parents; a `start` that does not exist finds nothing.
pub fn discover_config(start: &Path) -> Option<(PathBuf, Config)> {
    let mut current = start.canonicalize().ok()?;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists()
            && let Ok(config) = load_config(&config_path)
        {
            return Some((config_path, config));
        }

        if !current.pop() {
            break;
        }
    }

    None
}

// ============================================================================
// Precedence Resolution
// ============================================================================

/// CLI override options.
///
/// `threshold` stays textual so action inputs and flags share one parser.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub threshold: Option<String>,
    pub zero_coverage: Option<ZeroCoverage>,
    pub base_dir: Option<String>,
    pub head_dir: Option<String>,
    pub suite: Option<String>,
}

/// Resolve effective configuration from the config file and CLI overrides.
///
/// Precedence: CLI > config file > defaults. A blank CLI threshold counts as
/// unset, since unset action inputs arrive as empty strings.
pub fn resolve_config(
    config: Option<&Config>,
    cli: &CliOverrides,
) -> Result<EffectiveConfig, ConfigError> {
    let cli_threshold = match cli.threshold.as_deref() {
        Some(text) if !text.trim().is_empty() => Some(parse_threshold(text)?),
        _ => None,
    };

    let threshold = cli_threshold
        .or_else(|| config.and_then(|c| c.threshold))
        .ok_or(ConfigError::MissingThreshold)?;

    let reports = config.map(|c| c.reports.clone()).unwrap_or_default();

    Ok(EffectiveConfig {
        threshold,
        zero_coverage: cli
            .zero_coverage
            .or_else(|| config.and_then(|c| c.zero_coverage))
            .unwrap_or_default(),
        base_dir: cli
            .base_dir
            .clone()
            .or(reports.base_dir)
            .unwrap_or_else(|| DEFAULT_BASE_DIR.to_string()),
        head_dir: cli
            .head_dir
            .clone()
            .or(reports.head_dir)
            .unwrap_or_else(|| DEFAULT_HEAD_DIR.to_string()),
        suite: cli
            .suite
            .clone()
            .or(reports.suite)
            .unwrap_or_else(|| DEFAULT_SUITE.to_string()),
    })
}

// ============================================================================
// Tests
// ============================================================================
