//! # flexshop-builder
//!
//! Translates a validated [`flexshop_core::ScheduleRequest`] into a Pumpkin
//! constraint model: one start/end variable pair per operation, a
//! presence-literal ring per eligible resource, per-window containment
//! literals, and the tardiness objective.
//!
//! This crate does not call the solver. It only builds the model; running it
//! is `flexshop-solver`'s job, so that a single build can in principle be
//! re-solved under different termination conditions.
//!
//! ## Variable ordering
//!
//! Operations are emitted in input order: products in request order, route
//! steps ascending, eligible resources in resource-list order. This is not
//! required for correctness, but is required so that two builds of the same
//! request produce identical variable orderings.

use std::collections::HashMap;

use pumpkin_solver::constraints as cp;
use pumpkin_solver::variables::{DomainId, TransformableVariable};
use pumpkin_solver::{ConstraintTag, Solver};
use thiserror::Error;
use tracing::debug;

use flexshop_core::{horizon_bound, to_minutes, Capability, ProductId, ResourceId, ScheduleRequest};

/// A build-time failure: a route step names a capability that no resource
/// provides. Everything else is caught earlier, at CDM construction in
/// `flexshop-core`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "no resource provides capability '{capability}' required by product '{product}' (route step {op_index})"
    )]
    NoEligibleResource {
        product: ProductId,
        op_index: usize,
        capability: Capability,
    },
}

/// One eligible (operation, resource) pairing: a presence literal and the
/// window-containment literals gating it.
#[derive(Debug, Clone)]
pub struct ResourceChoice {
    pub resource_id: ResourceId,
    pub resource_index: usize,
    /// `A[p,i,r]`: 1 iff this operation is assigned to this resource.
    pub presence: DomainId,
    /// `N[p,i,r,k]`: 1 iff the operation sits inside calendar window `k` of
    /// this resource, indexed in the resource's calendar order.
    pub window_literals: Vec<DomainId>,
}

/// Decision variables for a single route step.
#[derive(Debug, Clone)]
pub struct OperationVars {
    pub product: ProductId,
    pub op_index: usize,
    pub capability: Capability,
    pub duration_minutes: i64,
    /// `S[p,i]`.
    pub start: DomainId,
    /// `E[p,i]`.
    pub end: DomainId,
    /// Eligible resources for this operation, in input order.
    pub resources: Vec<ResourceChoice>,
}

/// Per-product tardiness variable, `T[p] = max(0, C[p] - D[p])`.
#[derive(Debug, Clone)]
pub struct ProductTardiness {
    pub product: ProductId,
    pub due_minutes: i64,
    pub tardiness: DomainId,
}

/// A fully built constraint model, ready to hand to `flexshop-solver`.
pub struct ConstraintModel {
    pub solver: Solver,
    pub constraint_tag: ConstraintTag,
    pub reference: flexshop_core::Instant,
    pub horizon_bound_minutes: i64,
    /// Operations in deterministic build order (product order, route index
    /// ascending).
    pub operations: Vec<OperationVars>,
    pub tardiness: Vec<ProductTardiness>,
    /// `sum(T[p])`, the single objective variable passed to the optimiser.
    pub total_tardiness: DomainId,
}

/// Build the constraint model for `request`.
///
/// Returns [`BuildError::NoEligibleResource`] if any route step names a
/// capability no resource provides. `flexshop-core`'s request construction
/// does not check capability coverage; this is the authoritative check.
pub fn build(request: &ScheduleRequest) -> Result<ConstraintModel, BuildError> {
    let horizon_bound_minutes = horizon_bound(&request.horizon);
    let h = horizon_bound_minutes as i32;

    let mut solver = Solver::default();
    let constraint_tag = solver.new_constraint_tag();

    let mut capability_index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, resource) in request.resources.iter().enumerate() {
        for cap in &resource.capabilities {
            capability_index.entry(cap.as_str()).or_default().push(idx);
        }
    }

    let mut operations = Vec::new();
    let mut tardiness = Vec::new();

    for product in &request.products {
        let mut route_vars: Vec<usize> = Vec::with_capacity(product.route.len());

        for (op_index, op) in product.route.iter().enumerate() {
            let eligible = capability_index.get(op.capability.as_str()).cloned();
            let Some(eligible) = eligible.filter(|v| !v.is_empty()) else {
                return Err(BuildError::NoEligibleResource {
                    product: product.id.clone(),
                    op_index,
                    capability: op.capability.clone(),
                });
            };

            let start = solver.new_bounded_integer(0, h);
            let end = solver.new_bounded_integer(0, h);

            // end == start + duration, both directions (hard equality).
            post_ge(
                &mut solver,
                vec![(end, 1), (start, -1)],
                op.duration_minutes as i32,
                constraint_tag,
            );
            post_ge(
                &mut solver,
                vec![(start, 1), (end, -1)],
                -(op.duration_minutes as i32),
                constraint_tag,
            );

            let mut resources = Vec::with_capacity(eligible.len());
            let mut presences = Vec::with_capacity(eligible.len());
            for &resource_index in &eligible {
                let resource = &request.resources[resource_index];
                let presence = solver.new_bounded_integer(0, 1);
                presences.push(presence);

                let window_literals: Vec<DomainId> = resource
                    .calendar
                    .iter()
                    .map(|_| solver.new_bounded_integer(0, 1))
                    .collect();

                for (window, &literal) in resource.calendar.iter().zip(window_literals.iter()) {
                    let w_start = to_minutes(window.start, request.horizon.start) as i32;
                    let w_end = to_minutes(window.end, request.horizon.start) as i32;

                    // (presence AND literal) => start >= w_start
                    post_conditional_ge(
                        &mut solver,
                        &[presence, literal],
                        vec![(start, 1)],
                        w_start,
                        h,
                        constraint_tag,
                    );
                    // (presence AND literal) => end <= w_end, i.e. -end >= -w_end
                    post_conditional_ge(
                        &mut solver,
                        &[presence, literal],
                        vec![(end, -1)],
                        -w_end,
                        h,
                        constraint_tag,
                    );
                }

                // presence => at least one window literal true.
                let mut terms: Vec<(DomainId, i32)> =
                    window_literals.iter().map(|&l| (l, 1)).collect();
                terms.push((presence, -1));
                post_ge(&mut solver, terms, 0, constraint_tag);

                resources.push(ResourceChoice {
                    resource_id: resource.id.clone(),
                    resource_index,
                    presence,
                    window_literals,
                });
            }

            // Exactly one resource chosen: sum(presence) == 1.
            let ge_terms: Vec<(DomainId, i32)> = presences.iter().map(|&p| (p, 1)).collect();
            let le_terms: Vec<(DomainId, i32)> = presences.iter().map(|&p| (p, -1)).collect();
            post_ge(&mut solver, ge_terms, 1, constraint_tag);
            post_ge(&mut solver, le_terms, -1, constraint_tag);

            let op_idx = operations.len();
            operations.push(OperationVars {
                product: product.id.clone(),
                op_index,
                capability: op.capability.clone(),
                duration_minutes: op.duration_minutes,
                start,
                end,
                resources,
            });
            route_vars.push(op_idx);
        }

        // Precedence: end(op_i) <= start(op_{i+1}).
        for window in route_vars.windows(2) {
            let (prev, next) = (window[0], window[1]);
            let prev_end = operations[prev].end;
            let next_start = operations[next].start;
            post_ge(&mut solver, vec![(next_start, 1), (prev_end, -1)], 0, constraint_tag);
        }

        let due_minutes = to_minutes(product.due, request.horizon.start);
        let completion = operations[*route_vars.last().unwrap()].end;
        let tardiness_var = solver.new_bounded_integer(0, h);
        // T[p] >= C[p] - D[p]; minimizing the objective drives it to equality.
        post_ge(
            &mut solver,
            vec![(tardiness_var, 1), (completion, -1)],
            -(due_minutes as i32),
            constraint_tag,
        );
        tardiness.push(ProductTardiness {
            product: product.id.clone(),
            due_minutes,
            tardiness: tardiness_var,
        });
    }

    post_no_overlap(&mut solver, &operations, request.resources.len(), h, constraint_tag);

    let total_upper = h.saturating_mul(tardiness.len().max(1) as i32);
    let total_tardiness = solver.new_bounded_integer(0, total_upper);
    let mut total_terms: Vec<(DomainId, i32)> = tardiness.iter().map(|t| (t.tardiness, -1)).collect();
    total_terms.push((total_tardiness, 1));
    post_ge(&mut solver, total_terms, 0, constraint_tag);

    debug!(
        operations = operations.len(),
        products = tardiness.len(),
        horizon_bound_minutes,
        "constraint model built"
    );

    Ok(ConstraintModel {
        solver,
        constraint_tag,
        reference: request.horizon.start,
        horizon_bound_minutes,
        operations,
        tardiness,
        total_tardiness,
    })
}

/// For each resource, operations eligible for it pairwise cannot overlap
/// when both are present. Modeled with one order boolean per pair plus a
/// big-M disjunction, since Pumpkin's `cumulative` constraint takes constant
/// (not variable) demands and so cannot express an *optional* interval.
fn post_no_overlap(
    solver: &mut Solver,
    operations: &[OperationVars],
    resource_count: usize,
    h: i32,
    tag: ConstraintTag,
) {
    for resource_index in 0..resource_count {
        let mut on_resource: Vec<(DomainId, DomainId, DomainId)> = Vec::new();
        for op in operations {
            if let Some(choice) = op.resources.iter().find(|c| c.resource_index == resource_index) {
                on_resource.push((op.start, op.end, choice.presence));
            }
        }

        for i in 0..on_resource.len() {
            for j in (i + 1)..on_resource.len() {
                let (s_a, e_a, a_a) = on_resource[i];
                let (s_b, e_b, a_b) = on_resource[j];
                let order = solver.new_bounded_integer(0, 1);

                // order=1: b starts at/after a ends.
                post_conditional_ge(solver, &[order, a_a, a_b], vec![(s_b, 1), (e_a, -1)], 0, h, tag);
                // order=0: a starts at/after b ends. "not order" folded in via -order coefficient.
                post_not_conditional_ge(solver, order, &[a_a, a_b], vec![(s_a, 1), (e_b, -1)], 0, h, tag);
            }
        }
    }
}

/// Post `sum(coeff * var) >= bound` unconditionally.
fn post_ge(solver: &mut Solver, terms: Vec<(DomainId, i32)>, bound: i32, tag: ConstraintTag) {
    let vars: Vec<_> = terms.into_iter().map(|(v, c)| v.scaled(c)).collect();
    let _ = solver.add_constraint(cp::greater_than_or_equals(vars, bound, tag)).post();
}

/// Post `sum(coeff * lhs) >= bound`, relaxed by big-M unless every boolean in
/// `conds` is 1. Standard conjunction-of-booleans implication encoding.
fn post_conditional_ge(
    solver: &mut Solver,
    conds: &[DomainId],
    lhs: Vec<(DomainId, i32)>,
    bound: i32,
    m: i32,
    tag: ConstraintTag,
) {
    let mut terms = lhs;
    for &c in conds {
        terms.push((c, -m));
    }
    post_ge(solver, terms, bound - m * conds.len() as i32, tag);
}

/// Like [`post_conditional_ge`], but the distinguished condition `negated`
/// gates the implication when it is 0 rather than 1 (folded in by using a
/// positive coefficient instead of negative).
fn post_not_conditional_ge(
    solver: &mut Solver,
    negated: DomainId,
    conds: &[DomainId],
    lhs: Vec<(DomainId, i32)>,
    bound: i32,
    m: i32,
    tag: ConstraintTag,
) {
    let mut terms = lhs;
    terms.push((negated, m));
    for &c in conds {
        terms.push((c, -m));
    }
    let k = (conds.len() + 1) as i32;
    post_ge(solver, terms, bound - m * (k - 1), tag);
}
