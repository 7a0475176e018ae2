//! # flexshop-solver
//!
//! The solver driver: runs the Pumpkin CP-SAT-style solver built by
//! `flexshop-builder` under a wall-clock budget, and either extracts a
//! solution or produces a structured infeasibility diagnostic.
//!
//! Diagnostics are computed without re-solving; they are cheap, purely
//! arithmetic checks over the original request, run regardless of which
//! terminal status the solver returned, so a caller always gets at least one
//! plausible reason alongside the generic "no feasible schedule" line.

use std::collections::HashSet;
use std::time::Duration;

use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use thiserror::Error;
use tracing::{debug, info, warn};

use flexshop_builder::ConstraintModel;
use flexshop_core::{from_minutes, to_minutes, Assignment, ScheduleRequest};

/// A solver-driver failure. `Infeasible` is a normal, user-visible outcome,
/// not an internal error.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("no feasible schedule: {}", .diagnostics.join("; "))]
    Infeasible { diagnostics: Vec<String> },

    #[error("solver internal error: {0}")]
    Internal(String),
}

/// Run `model` to completion or to its time budget, and return the solved
/// assignments in operation-build order.
pub fn solve(request: &ScheduleRequest, model: ConstraintModel) -> Result<Vec<Assignment>, SolveError> {
    let ConstraintModel {
        mut solver,
        reference,
        total_tardiness,
        operations,
        ..
    } = model;

    let mut brancher = solver.default_brancher();
    let mut termination =
        TimeBudget::starting_now(Duration::from_secs(request.settings.time_limit_seconds as u64));

    fn noop_callback<B>(_: &pumpkin_solver::Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}

    let result = solver.optimise(
        &mut brancher,
        &mut termination,
        LinearSatUnsat::new(OptimisationDirection::Minimise, total_tardiness, noop_callback),
    );

    match result {
        OptimisationResult::Optimal(solution) => {
            info!(status = "optimal", "solve complete");
            Ok(extract(&operations, reference, &solution))
        }
        OptimisationResult::Satisfiable(solution) => {
            info!(status = "feasible", "solve complete (time budget reached)");
            Ok(extract(&operations, reference, &solution))
        }
        OptimisationResult::Unsatisfiable => {
            warn!("solver proved infeasibility");
            Err(SolveError::Infeasible {
                diagnostics: infeasibility_diagnostics(request),
            })
        }
        OptimisationResult::Unknown => {
            warn!("solver exhausted its time budget without an incumbent");
            let mut diagnostics = infeasibility_diagnostics(request);
            diagnostics.insert(
                0,
                "solver reached its time budget without finding a feasible solution".to_string(),
            );
            Err(SolveError::Infeasible { diagnostics })
        }
        #[allow(unreachable_patterns)]
        _ => Err(SolveError::Internal(
            "solver returned an unexpected terminal status".to_string(),
        )),
    }
}

/// Read back the chosen resource (the unique presence literal equal to 1)
/// and the solved start/end for every operation. The resource-choice
/// variable is not separately materialized; the presence literal ring is
/// the single source of truth.
fn extract(
    operations: &[flexshop_builder::OperationVars],
    reference: flexshop_core::Instant,
    solution: &impl ProblemSolution,
) -> Vec<Assignment> {
    let mut assignments = Vec::with_capacity(operations.len());
    for op in operations {
        let chosen = op
            .resources
            .iter()
            .find(|choice| solution.get_integer_value(choice.presence) == 1)
            .expect("exactly-one constraint guarantees a chosen resource");

        let start_minutes = solution.get_integer_value(op.start) as i64;
        let end_minutes = solution.get_integer_value(op.end) as i64;

        debug!(
            product = %op.product,
            capability = %op.capability,
            resource = %chosen.resource_id,
            start_minutes,
            end_minutes,
            "extracted assignment"
        );

        assignments.push(Assignment {
            product: op.product.clone(),
            op: op.capability.clone(),
            resource: chosen.resource_id.clone(),
            start: from_minutes(start_minutes, reference),
            end: from_minutes(end_minutes, reference),
        });
    }
    assignments
}

/// Plausible causes of infeasibility: duration-vs-due overruns first, then
/// missing capability coverage (redundant with the builder's own
/// pre-check), then a generic catch-all line that is always present.
fn infeasibility_diagnostics(request: &ScheduleRequest) -> Vec<String> {
    let mut reasons = Vec::new();

    for product in &request.products {
        let due_minutes = to_minutes(product.due, request.horizon.start);
        let min_duration = product.minimum_duration_minutes();
        if min_duration > due_minutes {
            reasons.push(format!(
                "product '{}': minimum route duration ({min_duration} min) exceeds its due offset ({due_minutes} min)",
                product.id
            ));
        }
    }

    let mut seen_capabilities = HashSet::new();
    for product in &request.products {
        for op in &product.route {
            if !seen_capabilities.insert(op.capability.clone()) {
                continue;
            }
            if !request.resources.iter().any(|r| r.provides(&op.capability)) {
                reasons.push(format!("no resource provides capability '{}'", op.capability));
            }
        }
    }

    reasons.push("no feasible schedule exists under the given constraints".to_string());
    reasons
}
