//! ts-explicit - adds explicit type annotations to TypeScript sources.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::{ContextKind, ErrorKind};
use clap::Parser;
use env_logger::Env;
use ts_explicit::prelude::*;

const USAGE: &str =
    "Usage: ts-explicit <glob-pattern> [--tsconfig=<path>] [--include-literal-types] [--ignore-any-type]";

/// Command-line interface for ts-explicit.
#[derive(Parser, Debug)]
#[command(
    name = "ts-explicit",
    version,
    about = "Adds explicit type annotations to TypeScript files",
    long_about = None
)]
struct Cli {
    /// Glob pattern selecting the files to annotate, relative to the working directory
    pattern: Option<String>,

    /// tsconfig.json to read compiler options from (default: ./tsconfig.json if present)
    #[arg(long, value_name = "PATH")]
    tsconfig: Option<PathBuf>,

    /// Also annotate variables whose inferred type is a literal type
    #[arg(long)]
    include_literal_types: bool,

    /// Never add `any` annotations
    #[arg(long)]
    ignore_any_type: bool,
}

fn setup_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("Error: {}", message);
    eprintln!("{}", USAGE);
    ExitCode::FAILURE
}

fn execute(cli: Cli, pattern: String) -> anyhow::Result<RunSummary> {
    let cwd = std::env::current_dir().context("failed to determine the working directory")?;
    let options = RunOptions {
        cwd,
        pattern,
        tsconfig: cli.tsconfig,
        config: RunConfig {
            include_literal_types: cli.include_literal_types,
            ignore_any_type: cli.ignore_any_type,
        },
    };

    let summary = run(&options, io::stdout().lock())?;
    Ok(summary)
}

fn main() -> ExitCode {
    setup_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        },
        Err(e) => {
            let argument = match e.get(ContextKind::InvalidArg) {
                Some(value) => value.to_string(),
                None => e.kind().to_string(),
            };
            return usage_error(&format!("Invalid arguments: {}", argument));
        },
    };

    let Some(pattern) = cli.pattern.clone() else {
        return usage_error("glob pattern is required.");
    };

    match execute(cli, pattern) {
        Ok(summary) => {
            log::info!(
                "{} file(s) processed, {} modified, {} annotation(s)",
                summary.files_processed,
                summary.files_modified,
                summary.annotations
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}
