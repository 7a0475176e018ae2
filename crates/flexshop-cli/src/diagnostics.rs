//! Terminal/JSON rendering for schedule responses and failures.
//!
//! `0` on success, `1` on any reported failure. The response shape is
//! binary: a solved schedule, or an `{error, why}` payload, so there is
//! no warning/hint severity ladder here.

use std::io::Write;

use flexshop_core::{Assignment, Kpis, ScheduleErrorPayload};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}', expected 'text' or 'json'")),
        }
    }
}

#[derive(Serialize)]
struct ScheduleResponseView<'a> {
    assignments: &'a [Assignment],
    kpis: &'a Kpis,
}

/// Render a successful solve to `writer` and return `ExitCode::Success`.
pub fn emit_success(
    writer: &mut impl Write,
    format: OutputFormat,
    assignments: &[Assignment],
    kpis: &Kpis,
    quiet: bool,
) -> std::io::Result<ExitCode> {
    match format {
        OutputFormat::Json => {
            let view = ScheduleResponseView { assignments, kpis };
            serde_json::to_writer_pretty(&mut *writer, &view)?;
            writeln!(writer)?;
        }
        OutputFormat::Text if quiet => {}
        OutputFormat::Text => {
            writeln!(writer, "{} assignment(s):", assignments.len())?;
            for a in assignments {
                writeln!(
                    writer,
                    "  {} / {} -> {} [{} - {}]",
                    a.product, a.op, a.resource, a.start, a.end
                )?;
            }
            writeln!(writer)?;
            writeln!(writer, "tardiness:   {} min", kpis.tardiness_minutes)?;
            writeln!(writer, "changeovers: {}", kpis.changeovers)?;
            writeln!(writer, "makespan:    {} min", kpis.makespan_minutes)?;
            for (resource, pct) in &kpis.utilization {
                writeln!(writer, "  utilization[{resource}] = {pct}%")?;
            }
        }
    }
    Ok(ExitCode::Success)
}

/// Render a failure (`{error, why}`) to `writer` and return `ExitCode::Failure`.
pub fn emit_failure(
    writer: &mut impl Write,
    format: OutputFormat,
    error: &str,
    why: &[String],
) -> std::io::Result<ExitCode> {
    let payload = ScheduleErrorPayload {
        error: error.to_string(),
        why: why.to_vec(),
    };
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, &payload)?;
            writeln!(writer)?;
        }
        OutputFormat::Text => {
            writeln!(writer, "error: {}", payload.error)?;
            for reason in &payload.why {
                writeln!(writer, "  - {reason}")?;
            }
        }
    }
    Ok(ExitCode::Failure)
}
