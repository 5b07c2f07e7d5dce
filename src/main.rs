//! gocpg command-line interface.
//!
//! ```text
//! gocpg [flags] <primary-module-dir> <output-db-path>
//! ```
//!
//! Exit codes: 0 on success, 1 on any fatal error (argument validation,
//! loader failure, store flush rollback). The first error line goes to
//! stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gocpg::loader::SkipConfig;
use gocpg::moduleset::{ModuleInfo, ModuleSet};
use gocpg::progress::Progress;

/// Generate a Code Property Graph SQLite database from Go modules.
#[derive(Parser)]
#[command(
    name = "gocpg",
    version,
    about = "Generates a Code Property Graph (CPG) SQLite database from Go modules"
)]
struct Cli {
    /// Primary module directory.
    primary_dir: PathBuf,

    /// Output database path.
    output: PathBuf,

    /// Skip generated files (basename ends with .pb.go).
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    skip_generated: bool,

    /// Skip test files (basename ends with _test.go).
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    skip_tests: bool,

    /// Print detailed progress.
    #[arg(long)]
    verbose: bool,

    /// Run validation queries after the write.
    #[arg(long)]
    validate: bool,

    /// Comma-separated dir:module-path:prefix triples for extra modules
    /// to co-analyze.
    #[arg(long, default_value = "")]
    modules: String,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let prog = Progress::new(cli.verbose);

    let primary_dir = cli
        .primary_dir
        .canonicalize()
        .with_context(|| format!("invalid primary dir: {}", cli.primary_dir.display()))?;
    if !primary_dir.is_dir() {
        bail!("primary dir is not a directory: {}", primary_dir.display());
    }

    let primary = ModuleInfo {
        mod_path: read_module_path(&primary_dir)
            .with_context(|| format!("no readable go.mod in {}", primary_dir.display()))?,
        dir: primary_dir,
        prefix: String::new(),
    };

    let mut extras = Vec::new();
    if !cli.modules.is_empty() {
        for spec in cli.modules.split(',') {
            let parts: Vec<&str> = spec.trim().splitn(3, ':').collect();
            if parts.len() != 3 {
                prog.log(format!(
                    "Warning: invalid --modules spec {spec:?} (want dir:module-path:prefix)"
                ));
                continue;
            }
            let dir = match PathBuf::from(parts[0]).canonicalize() {
                Ok(d) => d,
                Err(e) => {
                    prog.log(format!("Warning: invalid module dir {:?}: {e}", parts[0]));
                    continue;
                }
            };
            extras.push(ModuleInfo {
                dir,
                mod_path: parts[1].to_string(),
                prefix: parts[2].to_string(),
            });
        }
    }

    let modset = ModuleSet::new(primary, extras);
    prog.log(format!("Analyzing {} module(s)", modset.modules().len()));

    let skip = SkipConfig {
        skip_tests: cli.skip_tests,
        skip_generated: cli.skip_generated,
    };

    let analysis = gocpg::analyze(&modset, skip, &prog)?;
    gocpg::db::write(&cli.output, &analysis.store, &modset, &[], cli.validate, &prog)?;

    prog.log(format!(
        "Done. {} nodes, {} edges.",
        analysis.store.nodes.len(),
        analysis.store.edges.len()
    ));
    Ok(())
}

/// Module path from `dir/go.mod`.
fn read_module_path(dir: &std::path::Path) -> Result<String> {
    let content = std::fs::read_to_string(dir.join("go.mod"))?;
    for line in content.lines() {
        let line = line.trim();
        if let Some(path) = line.strip_prefix("module ") {
            return Ok(path.trim().to_string());
        }
    }
    bail!("go.mod has no module directive")
}
