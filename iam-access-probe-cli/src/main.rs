use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{info, warn};

use iam_access_probe_core::{
    format_report, AccessProbeError, AccessProbeService, ExpectationMatrix, ProbePayload, Report,
    RunOptions, S3StoreFactory, DEFAULT_PROBE_FILE_NAME, DEFAULT_REGION,
};

/// Exit code when the run completed and found no mismatches.
const EXIT_CLEAN: u8 = 0;
/// Exit code when at least one mismatch was reported.
const EXIT_MISMATCHES: u8 = 1;
/// Exit code for configuration errors and aborted runs.
const EXIT_FAILURE: u8 = 2;
/// Exit code when a second interrupt forces the process to quit.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One line per mismatch
    Text,
    /// The structured report as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "iam-access-probe",
    version,
    about = "Probe S3 with each IAM of an expectation matrix and report permissions that differ from the expectation",
    long_about = None
)]
struct Cli {
    /// Expectation matrix file (JSON)
    #[arg(long, env = "IAM_ACCESS_PROBE_MATRIX", default_value = "test_cases.json")]
    matrix: PathBuf,

    /// AWS region of the buckets under test
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// S3-compatible endpoint to probe instead of AWS (enables path-style addressing)
    #[arg(long, env = "IAM_ACCESS_PROBE_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Also probe catalog resources an IAM does not declare, as folders with default expectations
    #[arg(long)]
    expand_catalog: bool,

    /// Object name used to probe folder resources
    #[arg(long, default_value = DEFAULT_PROBE_FILE_NAME)]
    probe_file_name: String,

    /// Consecutive client construction failures before the run is aborted (at least 1)
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    max_client_failures: usize,

    /// Report output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn exit_code_for(report: &Report) -> u8 {
    if report.aborted.is_some() {
        EXIT_FAILURE
    } else if report.has_mismatches() {
        EXIT_MISMATCHES
    } else {
        EXIT_CLEAN
    }
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("{}", "Printing report ...".bold());
            let mismatch_lines = report.mismatches.len();
            for (index, line) in format_report(report).into_iter().enumerate() {
                if index < mismatch_lines {
                    println!("{}", line.red());
                } else if index == 0 {
                    println!("{}", line.green());
                } else {
                    println!("{}", line.yellow());
                }
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<u8> {
    // Configuration errors abort before any probe is issued.
    let matrix = match ExpectationMatrix::from_path(&cli.matrix) {
        Ok(matrix) => matrix,
        Err(e @ (AccessProbeError::Configuration(_) | AccessProbeError::Json(_))) => {
            eprintln!("{e}");
            return Ok(EXIT_FAILURE);
        }
        Err(e) => return Err(e).context("Failed to load expectation matrix"),
    };
    info!(
        "Loaded expectation matrix '{}': {} IAMs, {} buckets",
        cli.matrix.display(),
        matrix.iams.len(),
        matrix.buckets.len()
    );

    let factory = S3StoreFactory::new(cli.region.clone(), cli.endpoint_url.clone());
    let options = RunOptions {
        expand_catalog: cli.expand_catalog,
        probe_file_name: cli.probe_file_name.clone(),
        max_consecutive_client_failures: cli.max_client_failures,
    };
    let service = AccessProbeService::new(factory, options);

    // First interrupt stops the run after the current IAM, a second one exits immediately.
    let abort = service.abort_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if abort.swap(true, Ordering::SeqCst) {
                warn!("Second interrupt received, exiting");
                std::process::exit(EXIT_INTERRUPTED);
            }
            warn!(
                "Interrupt received, stopping after the current IAM (press Ctrl-C again to exit now)"
            );
        }
    });

    // Removed when dropped, on every path out of this function.
    let payload = ProbePayload::create().context("Failed to create probe payload")?;
    let report = service.run(&matrix, &payload).await;
    drop(payload);

    print_report(&report, cli.format)?;
    Ok(exit_code_for(&report))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.no_color || !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
