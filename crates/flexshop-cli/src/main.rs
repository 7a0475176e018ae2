//! flexshop CLI - flexible job-shop scheduling engine
//!
//! Command-line driver for the core scheduling pipeline: read a canonical
//! (or adapter-recognized) request, build the constraint model, solve it
//! under a wall-clock budget, and print assignments plus KPIs.

mod diagnostics;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flexshop_adapter::AdapterRegistry;
use flexshop_core::{Assignment, Kpis, ScheduleRequest};
use flexshop_solver::SolveError;

use crate::diagnostics::{emit_failure, emit_success, ExitCode, OutputFormat};

#[derive(Parser)]
#[command(name = "flexshop")]
#[command(author, version, about = "Flexible job-shop scheduling engine", long_about = None)]
struct Cli {
    /// Verbose output (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the CDM from a request file and report structural errors only
    /// (no constraint model is built, no solve is attempted).
    Check {
        /// Input request file (canonical JSON, or any registered adapter shape)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Build the constraint model, solve it, and print assignments + KPIs.
    Solve {
        /// Input request file (canonical JSON, or any registered adapter shape)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Override settings.time_limit_seconds from the request file
        #[arg(long)]
        time_limit: Option<u32>,

        /// Suppress the per-assignment listing in text mode
        #[arg(short, long)]
        quiet: bool,
    },

    /// Independently re-check a request + response pair: constraint
    /// violations plus KPI reproducibility within tolerance. Exit 0 iff
    /// everything passes.
    Validate {
        /// The original request file
        #[arg(long, value_name = "FILE")]
        request: PathBuf,

        /// The response file to check (`{assignments, kpis}`)
        #[arg(long, value_name = "FILE")]
        response: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Deserialize)]
struct ScheduleResponseFile {
    assignments: Vec<Assignment>,
    kpis: Kpis,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Check { file, format } => run_check(file, parse_format(&format)?)?,
        Commands::Solve {
            file,
            format,
            time_limit,
            quiet,
        } => run_solve(file, parse_format(&format)?, time_limit, quiet)?,
        Commands::Validate {
            request,
            response,
            format,
        } => run_validate(request, response, parse_format(&format)?)?,
    };

    std::process::exit(exit_code.code());
}

fn init_tracing(verbose: u8) {
    let default_directive = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();
}

fn parse_format(raw: &str) -> Result<OutputFormat> {
    raw.parse::<OutputFormat>().map_err(anyhow::Error::msg)
}

fn read_request(file: &PathBuf) -> Result<(serde_json::Value, AdapterRegistry)> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", file.display()))?;
    Ok((value, AdapterRegistry::new()))
}

/// Apply `--time-limit`, if given, and re-validate: an already-constructed
/// request is known-valid only for the settings it was built with, and a
/// caller-supplied override (e.g. `--time-limit 0`) must go through the
/// same invariant check construction does.
fn apply_time_limit_override(
    request: ScheduleRequest,
    time_limit_override: Option<u32>,
) -> Result<ScheduleRequest, flexshop_core::ValidationError> {
    let Some(time_limit_seconds) = time_limit_override else {
        return Ok(request);
    };
    ScheduleRequest::new(
        request.horizon,
        request.resources,
        request.products,
        request.changeover_matrix_minutes,
        flexshop_core::Settings {
            time_limit_seconds,
        },
    )
}

fn run_check(file: PathBuf, format: OutputFormat) -> Result<ExitCode> {
    let (value, registry) = read_request(&file)?;
    let mut stdout = std::io::stdout();
    match registry.to_cdm(&value) {
        Ok(request) => {
            tracing::info!(
                products = request.products.len(),
                resources = request.resources.len(),
                "request is well-formed"
            );
            Ok(emit_success(&mut stdout, format, &[], &Kpis::default(), true)?)
        }
        Err(err) => Ok(emit_failure(&mut stdout, format, "malformed request", &[err.to_string()])?),
    }
}

fn run_solve(
    file: PathBuf,
    format: OutputFormat,
    time_limit_override: Option<u32>,
    quiet: bool,
) -> Result<ExitCode> {
    let (value, registry) = read_request(&file)?;
    let mut stdout = std::io::stdout();

    let request: ScheduleRequest = match registry.to_cdm(&value) {
        Ok(r) => r,
        Err(err) => {
            return Ok(emit_failure(
                &mut stdout,
                format,
                "malformed request",
                &[err.to_string()],
            )?)
        }
    };

    let request = match apply_time_limit_override(request, time_limit_override) {
        Ok(r) => r,
        Err(err) => {
            return Ok(emit_failure(
                &mut stdout,
                format,
                "malformed request",
                &[err.to_string()],
            )?)
        }
    };

    let model = match flexshop_builder::build(&request) {
        Ok(model) => model,
        Err(err) => {
            return Ok(emit_failure(
                &mut stdout,
                format,
                "could not build constraint model",
                &[err.to_string()],
            )?)
        }
    };

    match flexshop_solver::solve(&request, model) {
        Ok(assignments) => {
            let kpis = flexshop_kpi::calculate(&request, &assignments);
            Ok(emit_success(&mut stdout, format, &assignments, &kpis, quiet)?)
        }
        Err(SolveError::Infeasible { diagnostics }) => {
            Ok(emit_failure(&mut stdout, format, "could not find feasible schedule", &diagnostics)?)
        }
        Err(SolveError::Internal(msg)) => {
            Ok(emit_failure(&mut stdout, format, "internal solver error", &[msg])?)
        }
    }
}

fn run_validate(request_file: PathBuf, response_file: PathBuf, format: OutputFormat) -> Result<ExitCode> {
    let request_raw =
        fs::read_to_string(&request_file).with_context(|| format!("reading {}", request_file.display()))?;
    let request: ScheduleRequest =
        serde_json::from_str(&request_raw).with_context(|| "parsing request as canonical JSON")?;

    let response_raw = fs::read_to_string(&response_file)
        .with_context(|| format!("reading {}", response_file.display()))?;
    let response: ScheduleResponseFile =
        serde_json::from_str(&response_raw).with_context(|| "parsing response JSON")?;

    let report = flexshop_validator::validate(&request, &response.assignments);
    let recalculated = flexshop_kpi::calculate(&request, &response.assignments);

    let tardiness_ok =
        (recalculated.tardiness_minutes - response.kpis.tardiness_minutes).abs() <= 1;
    let makespan_ok = (recalculated.makespan_minutes - response.kpis.makespan_minutes).abs() <= 1;
    let changeovers_ok = recalculated.changeovers == response.kpis.changeovers;

    let mut why = report.violations.clone();
    if !tardiness_ok {
        why.push(format!(
            "tardiness mismatch: reported {}, recalculated {}",
            response.kpis.tardiness_minutes, recalculated.tardiness_minutes
        ));
    }
    if !makespan_ok {
        why.push(format!(
            "makespan mismatch: reported {}, recalculated {}",
            response.kpis.makespan_minutes, recalculated.makespan_minutes
        ));
    }
    if !changeovers_ok {
        why.push(format!(
            "changeover mismatch: reported {}, recalculated {}",
            response.kpis.changeovers, recalculated.changeovers
        ));
    }

    let mut stdout = std::io::stdout();
    if why.is_empty() {
        Ok(emit_success(&mut stdout, format, &response.assignments, &recalculated, false)?)
    } else {
        Ok(emit_failure(&mut stdout, format, "validation failed", &why)?)
    }
}
