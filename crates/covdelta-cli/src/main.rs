//! covdelta compares SimpleCov coverage between the base and head of a pull
//! request, posts the comparison as a PR comment and gates on the base
//! branch coverage threshold.

use clap::{Args, Parser, Subcommand, ValueEnum};
use covdelta_adapters_coverage::{DEFAULT_SUITE, SimplecovError, parse_resultset};
use covdelta_adapters_github::{
    DEFAULT_API_URL, GithubCommentPoster, GithubError, GithubEventSource, StaticPullRequest,
};
use covdelta_adapters_repo::FsReportReader;
use covdelta_app::{
    AppError, CompareRequest, CompareResult, NO_PULL_REQUEST_MESSAGE, RunOutcome, SystemClock,
    build_comparison, run,
};
use covdelta_config::{
    CliOverrides, Config, ConfigError, ZeroCoverage, discover_config, load_config, resolve_config,
};
use covdelta_domain::summarize;
use covdelta_ports::{CommentPoster, PullRequestSource};
use covdelta_render::{render_error_command, render_warning_command};
use covdelta_types::Report;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Compare SimpleCov coverage between base and head and report it on the pull request.
#[derive(Parser)]
#[command(name = "covdelta")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// CLI zero-coverage option
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliZeroCoverage {
    /// Show 0% like a missing value
    Absent,
    /// Show 0% as a value
    Value,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare base and head coverage and comment on the pull request
    Compare(CompareArgs),
    /// Print the per-file coverage of one resultset as JSON
    Summarize {
        /// Path to a `.resultset.json`
        resultset: PathBuf,

        /// Resultset suite key
        #[arg(long, default_value = DEFAULT_SUITE)]
        suite: String,
    },
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Workspace root the report directories are relative to
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Minimum base coverage percentage (integer 0-100, overrides config file)
    #[arg(long, env = "INPUT_THRESHOLD")]
    threshold: Option<String>,

    /// Path to config file (default: auto-discover covdelta.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory of the base branch SimpleCov output
    #[arg(long)]
    base_dir: Option<String>,

    /// Directory of the head branch SimpleCov output
    #[arg(long)]
    head_dir: Option<String>,

    /// Resultset suite key
    #[arg(long)]
    suite: Option<String>,

    /// How 0% files are shown in the difference table
    #[arg(long, value_enum)]
    zero_coverage: Option<CliZeroCoverage>,

    /// Pull request number (default: read from the event payload)
    #[arg(long)]
    pr: Option<u64>,

    /// Path to the GitHub Actions event payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Repository in owner/name form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Token used to post the comment
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub REST API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Output path for report JSON
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output path for the markdown comment body
    #[arg(long)]
    md: Option<PathBuf>,

    /// Print the comment body instead of posting it
    #[arg(long)]
    dry_run: bool,
}

/// CLI errors
#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Simplecov(#[from] SimplecovError),

    #[error("{0}")]
    App(#[from] AppError),
}

/// Exit codes:
/// - 0: Pass, or no pull request to compare
/// - 1: Tool/runtime error (I/O, parse failure, posting failure)
/// - 2: Base coverage below the threshold
const EXIT_CODE_ERROR: i32 = 1;

fn main() {
    let cli = Cli::parse();
    let exit_code = match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            report_failure(&e.to_string());
            EXIT_CODE_ERROR
        }
    };
    std::process::exit(exit_code);
}

/// Report a failure on both channels: a workflow command for the runner and
/// a plain line for humans.
fn report_failure(message: &str) {
    println!("{}", render_error_command(message));
    eprintln!("error: {}", message);
}

fn run_cli(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Commands::Compare(args) => run_compare(args),
        Commands::Summarize { resultset, suite } => run_summarize(&resultset, &suite),
    }
}

// ============================================================================
// compare
// ============================================================================

fn run_compare(args: CompareArgs) -> Result<i32, CliError> {
    let reader = FsReportReader::new(&args.workspace);
    let clock = SystemClock;

    if args.dry_run {
        let request = resolve_request(&args)?;
        let result = build_comparison(&request, &reader, &clock)?;
        print!("{}", result.markdown);
        write_outputs(&args, &result.report, Some(&result.markdown))?;
        if let Some(message) = result.gate_message() {
            report_failure(&message);
        }
        return Ok(result.exit_code);
    }

    // Without a PR nothing else is looked at, not even the configuration.
    let Some(pr) = PrSource::from_args(&args)
        .pull_request_number()
        .map_err(AppError::PullRequest)?
    else {
        warn_no_pull_request();
        return Ok(RunOutcome::NoPullRequest.exit_code());
    };

    let request = resolve_request(&args)?;
    let poster = ActionsPoster {
        api_url: args.api_url.clone(),
        repository: args.repository.clone(),
        token: args.token.clone(),
    };

    let outcome = run(&request, &reader, &StaticPullRequest(pr), &poster, &clock)?;

    match &outcome {
        RunOutcome::NoPullRequest => warn_no_pull_request(),
        RunOutcome::Passed(result) => {
            write_result(&args, result)?;
        }
        RunOutcome::BelowThreshold { result, message } => {
            write_result(&args, result)?;
            report_failure(message);
        }
    }

    Ok(outcome.exit_code())
}

fn warn_no_pull_request() {
    println!("{}", render_warning_command(NO_PULL_REQUEST_MESSAGE));
    eprintln!("warning: {}", NO_PULL_REQUEST_MESSAGE);
}

fn resolve_request(args: &CompareArgs) -> Result<CompareRequest, CliError> {
    let config: Option<Config> = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => discover_config(&args.workspace).map(|(path, config)| {
            eprintln!("using config {}", path.display());
            config
        }),
    };

    let overrides = CliOverrides {
        threshold: args.threshold.clone(),
        zero_coverage: args.zero_coverage.map(|z| match z {
            CliZeroCoverage::Absent => ZeroCoverage::Absent,
            CliZeroCoverage::Value => ZeroCoverage::Value,
        }),
        base_dir: args.base_dir.clone(),
        head_dir: args.head_dir.clone(),
        suite: args.suite.clone(),
    };

    let effective = resolve_config(config.as_ref(), &overrides)?;
    Ok(CompareRequest::from_config(&effective))
}

fn write_result(args: &CompareArgs, result: &CompareResult) -> Result<(), CliError> {
    write_outputs(args, &result.report, Some(&result.markdown))
}

fn write_outputs(
    args: &CompareArgs,
    report: &Report,
    markdown: Option<&str>,
) -> Result<(), CliError> {
    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(report)?;
        write_file(out, &json)?;
        eprintln!("wrote report to {}", out.display());
    }

    if let (Some(md), Some(markdown)) = (&args.md, markdown) {
        write_file(md, markdown)?;
        eprintln!("wrote comment to {}", md.display());
    }

    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).map_err(|e| CliError::FileWrite {
        path: path.display().to_string(),
        source: e,
    })
}

/// Ensure the parent directory of a path exists
fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| CliError::DirCreate {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Pull request source chosen from the arguments: `--pr` wins over the
/// event payload.
enum PrSource {
    Static(StaticPullRequest),
    Event(GithubEventSource),
}

impl PrSource {
    fn from_args(args: &CompareArgs) -> Self {
        match args.pr {
            Some(number) => PrSource::Static(StaticPullRequest(number)),
            None => PrSource::Event(GithubEventSource::new(args.event_path.clone())),
        }
    }
}

impl PullRequestSource for PrSource {
    fn pull_request_number(&self) -> Result<Option<u64>, String> {
        match self {
            PrSource::Static(source) => source.pull_request_number(),
            PrSource::Event(source) => source.pull_request_number(),
        }
    }
}

/// Comment poster that only requires credentials once there is something to post.
struct ActionsPoster {
    api_url: String,
    repository: Option<String>,
    token: Option<String>,
}

impl ActionsPoster {
    fn poster(&self) -> Result<GithubCommentPoster, String> {
        let repository = non_blank(&self.repository)
            .ok_or("--repository (or GITHUB_REPOSITORY) is required to post a comment")?;
        let token = non_blank(&self.token)
            .ok_or("--token (or GITHUB_TOKEN) is required to post a comment")?;
        GithubCommentPoster::new(&self.api_url, repository, token)
            .map_err(|e: GithubError| e.to_string())
    }
}

impl CommentPoster for ActionsPoster {
    fn upsert_comment(&self, pr: u64, summary: &str, difference: &str) -> Result<(), String> {
        self.poster()?.upsert_comment(pr, summary, difference)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// summarize
// ============================================================================

fn run_summarize(path: &Path, suite: &str) -> Result<i32, CliError> {
    let text = fs::read_to_string(path).map_err(|e| CliError::FileRead {
        path: path.display().to_string(),
        source: e,
    })?;
    let files = parse_resultset(&text, suite)?;
    let snapshot = summarize(&files);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare_args(extra: &[&str]) -> CompareArgs {
        let mut argv = vec!["covdelta", "compare"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("arguments should parse").command {
            Commands::Compare(args) => args,
            Commands::Summarize { .. } => panic!("unexpected summarize command"),
        }
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["covdelta", "compare", "--threshold", "80"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_default_values() {
        let args = compare_args(&["--workspace", "ws", "--api-url", DEFAULT_API_URL]);
        assert_eq!(args.workspace, PathBuf::from("ws"));
        assert_eq!(args.api_url, DEFAULT_API_URL);
        assert!(args.out.is_none());
        assert!(args.md.is_none());
        assert!(!args.dry_run);
        assert!(args.zero_coverage.is_none());
    }

    #[test]
    fn test_cli_accepts_zero_coverage_values() {
        for (value, expected) in [
            ("absent", CliZeroCoverage::Absent),
            ("value", CliZeroCoverage::Value),
        ] {
            let args = compare_args(&["--zero-coverage", value]);
            assert_eq!(args.zero_coverage, Some(expected));
        }
    }

    #[test]
    fn test_cli_rejects_invalid_zero_coverage() {
        let result = Cli::try_parse_from(["covdelta", "compare", "--zero-coverage", "hidden"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_pr() {
        let result = Cli::try_parse_from(["covdelta", "compare", "--pr", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_summarize_default_suite() {
        let cli = Cli::try_parse_from(["covdelta", "summarize", "r.json"]).unwrap();
        match cli.command {
            Commands::Summarize { resultset, suite } => {
                assert_eq!(resultset, PathBuf::from("r.json"));
                assert_eq!(suite, "RSpec");
            }
            Commands::Compare(_) => panic!("unexpected compare command"),
        }
    }

    #[test]
    fn test_resolve_request_from_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = dir.path().display().to_string();
        let args = compare_args(&[
            "--workspace",
            &workspace,
            "--threshold",
            "75",
            "--base-dir",
            "cov/base",
            "--suite",
            "Minitest",
            "--zero-coverage",
            "value",
        ]);

        let request = resolve_request(&args).unwrap();

        assert_eq!(request.threshold, 75);
        assert_eq!(request.base_dir, "cov/base");
        assert_eq!(request.head_dir, "head-coverage-reports");
        assert_eq!(request.suite, "Minitest");
        assert_eq!(request.zero_coverage, covdelta_app::ZeroCoverage::Value);
    }

    #[test]
    fn test_resolve_request_from_discovered_config() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("covdelta.toml"),
            "threshold = 60\n[reports]\nhead_dir = \"cov/head\"\n",
        )
        .unwrap();
        let workspace = dir.path().display().to_string();
        let args = compare_args(&["--workspace", &workspace]);

        let request = resolve_request(&args).unwrap();

        assert_eq!(request.threshold, 60);
        assert_eq!(request.head_dir, "cov/head");
    }

    #[test]
    fn test_resolve_request_missing_threshold() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = dir.path().display().to_string();
        let args = compare_args(&["--workspace", &workspace]);

        let err = resolve_request(&args).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::MissingThreshold)));
    }

    #[test]
    fn test_pr_source_prefers_explicit_number() {
        let args = compare_args(&["--pr", "17", "--event-path", "/nonexistent/event.json"]);
        assert_eq!(PrSource::from_args(&args).pull_request_number(), Ok(Some(17)));
    }

    #[test]
    fn test_actions_poster_requires_repository() {
        let poster = ActionsPoster {
            api_url: DEFAULT_API_URL.to_string(),
            repository: None,
            token: Some("t".to_string()),
        };
        let err = poster.upsert_comment(1, "s", "d").unwrap_err();
        assert!(err.contains("GITHUB_REPOSITORY"));
    }

    #[test]
    fn test_actions_poster_requires_token() {
        let poster = ActionsPoster {
            api_url: DEFAULT_API_URL.to_string(),
            repository: Some("acme/shop".to_string()),
            token: Some("  ".to_string()),
        };
        let err = poster.upsert_comment(1, "s", "d").unwrap_err();
        assert!(err.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn test_ensure_parent_dir_with_simple_path() {
        assert!(ensure_parent_dir(Path::new("report.json")).is_ok());
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a/b/report.json");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }
}

// ============================================================================
// Property tests
// ============================================================================
