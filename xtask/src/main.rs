//! xtask - Development tasks for covdelta
//!
//! Golden fixture management: the comment bodies in `fixtures/golden/` are
//! regenerated from the SimpleCov workspaces in `fixtures/simplecov/`.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use covdelta_adapters_repo::FsReportReader;
use covdelta_app::{CompareRequest, SystemClock, build_comparison};

/// Development tasks for covdelta
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tasks for covdelta", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage golden test fixtures
    Fixtures {
        /// Check fixtures match expected output (exits non-zero if different)
        #[arg(long, conflicts_with = "update")]
        check: bool,

        /// Update fixtures with current output
        #[arg(long, conflicts_with = "check")]
        update: bool,
    },
}

/// Golden cases: SimpleCov workspace under `fixtures/simplecov/` and the
/// threshold it is rendered with.
const GOLDEN_CASES: [(&str, u32); 2] = [("changed", 80), ("unchanged", 90)];

fn main() -> std::process::ExitCode {
    match run_cli(Cli::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::ExitCode::from(1)
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fixtures { check, update } => cmd_fixtures(&find_project_root()?, check, update),
    }
}

// ============================================================================
// Fixtures Command
// ============================================================================

fn cmd_fixtures(project_root: &Path, check: bool, update: bool) -> Result<()> {
    let golden_dir = project_root.join("fixtures").join("golden");
    let fixtures = generate_fixtures(project_root)?;

    if check {
        let stale = stale_fixtures(&golden_dir, &fixtures)?;
        if !stale.is_empty() {
            for name in &stale {
                eprintln!("differs: {name}");
            }
            eprintln!("\nRun 'cargo xtask fixtures --update' to update fixtures.");
            bail!("{} fixture(s) out of date", stale.len());
        }
        println!("All {} fixture(s) match.", fixtures.len());
    } else if update {
        fs::create_dir_all(&golden_dir)?;

        for (name, content) in &fixtures {
            let fixture_path = golden_dir.join(name);
            fs::write(&fixture_path, content)
                .with_context(|| format!("failed to write {}", fixture_path.display()))?;
            println!("updated: {name}");
        }

        println!("\nUpdated {} fixture(s).", fixtures.len());
    } else {
        println!("Fixtures that would be generated:");
        for (name, _) in &fixtures {
            println!("  {name}");
        }
        println!("\nUse --check to verify or --update to regenerate.");
    }

    Ok(())
}

/// Generate all golden comment bodies as (filename, content) pairs.
fn generate_fixtures(project_root: &Path) -> Result<Vec<(String, String)>> {
    let simplecov_dir = project_root.join("fixtures").join("simplecov");
    if !simplecov_dir.exists() {
        bail!("fixtures directory not found at {}", simplecov_dir.display());
    }

    GOLDEN_CASES
        .iter()
        .map(|(name, threshold)| {
            let reader = FsReportReader::new(simplecov_dir.join(name));
            let request = CompareRequest {
                threshold: *threshold,
                ..Default::default()
            };
            let result = build_comparison(&request, &reader, &SystemClock)
                .with_context(|| format!("failed to compare fixture '{name}'"))?;
            Ok((format!("{name}.md"), result.markdown))
        })
        .collect()
}

/// Names of fixtures that are missing or differ from the generated content.
fn stale_fixtures(golden_dir: &Path, fixtures: &[(String, String)]) -> Result<Vec<String>> {
    let mut stale = Vec::new();

    for (name, expected) in fixtures {
        let path = golden_dir.join(name);
        if !path.exists() {
            stale.push(name.clone());
            continue;
        }

        let actual = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if actual.replace("\r\n", "\n") != *expected {
            stale.push(name.clone());
        }
    }

    Ok(stale)
}

// ============================================================================
// Utilities
// ============================================================================

/// Find the project root by looking for Cargo.toml with [workspace]
fn find_project_root() -> Result<PathBuf> {
    let mut current = std::env::current_dir()?;

    loop {
        let cargo_toml = current.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = fs::read_to_string(&cargo_toml)?;
            if content.contains("[workspace]") {
                return Ok(current);
            }
        }

        if !current.pop() {
            bail!("could not find workspace root (no Cargo.toml with [workspace] found)");
        }
    }
}
