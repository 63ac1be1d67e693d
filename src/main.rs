//! primescan CLI - print the primes found in column B of a spreadsheet

use anyhow::{Context, Result};
use clap::Parser;
use primescan::{ScanReport, ScannerBuilder};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "primescan")]
#[command(
    author,
    version,
    about = "Print the primes stored in the second column of a spreadsheet's first sheet"
)]
struct Cli {
    /// Input spreadsheet file (xlsx, xlsm, xls, xlsb, ods)
    input: PathBuf,

    /// Enable debug diagnostics on stderr
    #[arg(short = 'v', long, visible_alias = "verbose")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.debug);

    if !cli.input.is_file() {
        eprintln!("File not found or not a file: {}", cli.input.display());
        return ExitCode::FAILURE;
    }

    match run(&cli.input) {
        Ok(report) => {
            debug!(?report, "Finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// 診断ログを標準エラー出力へ。`RUST_LOG` が設定されていればそちらを優先
fn init_tracing(debug: bool) {
    let default_directive = if debug { "warn,primescan=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(input: &Path) -> Result<ScanReport> {
    let scanner = ScannerBuilder::new()
        .build()
        .context("Failed to configure scanner")?;

    scanner
        .scan_path(input, io::stdout())
        .with_context(|| format!("Failed to process file: {}", input.display()))
}
