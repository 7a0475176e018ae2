//! # flexshop-validator
//!
//! The independent post-hoc validator. Takes a request and a set of
//! assignments and re-checks every global invariant from scratch.
//!
//! This crate must never depend on `flexshop-builder` or `flexshop-solver`:
//! its entire purpose is to be a second, unrelated opinion on whether a
//! schedule is valid, so that a bug in the constraint encoding cannot also
//! hide itself from the check meant to catch it.

use std::collections::HashMap;

use flexshop_core::{Assignment, ScheduleRequest};

/// The result of validating a schedule: whether it is valid, and every
/// violation found along the way. The validator is total: it keeps
/// collecting violations rather than stopping at the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Re-check `assignments` against `request` from first principles.
pub fn validate(request: &ScheduleRequest, assignments: &[Assignment]) -> ValidationReport {
    let mut violations = Vec::new();
    violations.extend(check_resource_and_capability(request, assignments));
    violations.extend(check_no_overlap(assignments));
    violations.extend(check_precedence(request, assignments));
    violations.extend(check_calendar_compliance(request, assignments));
    violations.extend(check_horizon_bounds(request, assignments));
    ValidationReport { violations }
}

/// The referenced resource exists and provides the assignment's capability.
fn check_resource_and_capability(request: &ScheduleRequest, assignments: &[Assignment]) -> Vec<String> {
    let mut violations = Vec::new();
    for a in assignments {
        match request.get_resource(&a.resource) {
            None => violations.push(format!(
                "{}/{}: assignment references unknown resource '{}'",
                a.product, a.op, a.resource
            )),
            Some(resource) if !resource.provides(&a.op) => violations.push(format!(
                "{}/{}: resource '{}' does not provide capability '{}'",
                a.product, a.op, a.resource, a.op
            )),
            Some(_) => {}
        }
    }
    violations
}

/// Pairwise disjoint intervals per resource. Intervals touching at a
/// boundary (`a.end == b.start`) do not overlap.
fn check_no_overlap(assignments: &[Assignment]) -> Vec<String> {
    let mut violations = Vec::new();
    let mut by_resource: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for a in assignments {
        by_resource.entry(a.resource.as_str()).or_default().push(a);
    }

    for ops in by_resource.values() {
        for i in 0..ops.len() {
            for j in (i + 1)..ops.len() {
                let (a, b) = (ops[i], ops[j]);
                if a.start.0 < b.end.0 && b.start.0 < a.end.0 {
                    violations.push(format!(
                        "overlap on {}: {}/{} [{} - {}] overlaps {}/{} [{} - {}]",
                        a.resource, a.product, a.op, a.start, a.end, b.product, b.op, b.start, b.end
                    ));
                }
            }
        }
    }
    violations
}

/// Route order respected within each product. Assignments are matched to
/// route steps by capability, in start-time order when a capability
/// repeats within the route.
fn check_precedence(request: &ScheduleRequest, assignments: &[Assignment]) -> Vec<String> {
    let mut violations = Vec::new();
    let mut by_product: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for a in assignments {
        by_product.entry(a.product.as_str()).or_default().push(a);
    }

    for product in &request.products {
        let Some(ops) = by_product.get(product.id.as_str()) else {
            continue;
        };

        let mut by_capability: HashMap<&str, Vec<&Assignment>> = HashMap::new();
        for a in ops {
            by_capability.entry(a.op.as_str()).or_default().push(a);
        }
        for v in by_capability.values_mut() {
            v.sort_by_key(|a| a.start);
        }

        let mut cursor: HashMap<&str, usize> = HashMap::new();
        let matched: Vec<Option<&Assignment>> = product
            .route
            .iter()
            .map(|op| {
                let slot = cursor.entry(op.capability.as_str()).or_insert(0);
                let hit = by_capability
                    .get(op.capability.as_str())
                    .and_then(|v| v.get(*slot))
                    .copied();
                *slot += 1;
                hit
            })
            .collect();

        for pair in matched.windows(2) {
            let (Some(curr), Some(next)) = (pair[0], pair[1]) else {
                continue;
            };
            if curr.end.0 > next.start.0 {
                violations.push(format!(
                    "precedence violation in {}: {} ends at {} but {} starts at {}",
                    product.id, curr.op, curr.end, next.op, next.start
                ));
            }
        }
    }
    violations
}

/// Every assignment fits entirely within one working window of its
/// resource.
fn check_calendar_compliance(request: &ScheduleRequest, assignments: &[Assignment]) -> Vec<String> {
    let mut violations = Vec::new();
    for a in assignments {
        let Some(resource) = request.get_resource(&a.resource) else {
            continue; // already reported by check_resource_and_capability
        };
        let fits = resource
            .calendar
            .iter()
            .any(|w| w.start.0 <= a.start.0 && a.end.0 <= w.end.0);
        if !fits {
            violations.push(format!(
                "calendar violation: {}/{} on {} [{} - {}] is not within any working window",
                a.product, a.op, a.resource, a.start, a.end
            ));
        }
    }
    violations
}

/// Every start/end lies within `[horizon.start, horizon.end]`.
fn check_horizon_bounds(request: &ScheduleRequest, assignments: &[Assignment]) -> Vec<String> {
    let mut violations = Vec::new();
    for a in assignments {
        if a.start.0 < request.horizon.start.0 || a.end.0 > request.horizon.end.0 {
            violations.push(format!(
                "horizon violation: {}/{} [{} - {}] outside horizon [{} - {}]",
                a.product, a.op, a.start, a.end, request.horizon.start, request.horizon.end
            ));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexshop_core::{ChangeoverMatrix, Horizon, Instant, Operation, Product, Resource, Settings, Window};

    fn instant(s: &str) -> Instant {
        let dt = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .unwrap()
            .and_utc();
        Instant::new(dt)
    }

    fn request() -> ScheduleRequest {
        ScheduleRequest::new(
            Horizon {
                start: instant("2025-11-03T08:00:00"),
                end: instant("2025-11-03T16:00:00"),
            },
            vec![Resource {
                id: "R1".into(),
                capabilities: vec!["fill".into(), "label".into()],
                calendar: vec![Window {
                    start: instant("2025-11-03T08:00:00"),
                    end: instant("2025-11-03T16:00:00"),
                }],
            }],
            vec![Product {
                id: "P1".into(),
                family: "standard".into(),
                due: instant("2025-11-03T12:00:00"),
                route: vec![
                    Operation {
                        capability: "fill".into(),
                        duration_minutes: 30,
                    },
                    Operation {
                        capability: "label".into(),
                        duration_minutes: 20,
                    },
                ],
            }],
            ChangeoverMatrix::default(),
            Settings::default(),
        )
        .unwrap()
    }

    fn assignment(product: &str, op: &str, resource: &str, start: &str, end: &str) -> Assignment {
        Assignment {
            product: product.into(),
            op: op.into(),
            resource: resource.into(),
            start: instant(start),
            end: instant(end),
        }
    }

    #[test]
    fn accepts_a_valid_schedule() {
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T08:30:00"),
            assignment("P1", "label", "R1", "2025-11-03T08:30:00", "2025-11-03T08:50:00"),
        ];
        let report = validate(&request(), &assignments);
        assert!(report.is_valid(), "unexpected violations: {:?}", report.violations);
    }

    #[test]
    fn touching_boundaries_do_not_overlap() {
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T08:30:00"),
            assignment("P1", "label", "R1", "2025-11-03T08:30:00", "2025-11-03T08:50:00"),
        ];
        let report = validate(&request(), &assignments);
        assert!(!report.violations.iter().any(|v| v.contains("overlap")));
    }

    #[test]
    fn detects_overlap_on_same_resource() {
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T08:30:00"),
            assignment("P1", "label", "R1", "2025-11-03T08:15:00", "2025-11-03T08:35:00"),
        ];
        let report = validate(&request(), &assignments);
        assert!(report.violations.iter().any(|v| v.contains("overlap")));
    }

    #[test]
    fn detects_precedence_violation() {
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:30:00", "2025-11-03T09:00:00"),
            assignment("P1", "label", "R1", "2025-11-03T08:00:00", "2025-11-03T08:20:00"),
        ];
        let report = validate(&request(), &assignments);
        assert!(report.violations.iter().any(|v| v.contains("precedence")));
    }

    #[test]
    fn detects_calendar_violation() {
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R1",
            "2025-11-03T07:00:00",
            "2025-11-03T07:30:00",
        )];
        let report = validate(&request(), &assignments);
        assert!(report.violations.iter().any(|v| v.contains("calendar")));
    }

    #[test]
    fn detects_unknown_resource() {
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R9",
            "2025-11-03T08:00:00",
            "2025-11-03T08:30:00",
        )];
        let report = validate(&request(), &assignments);
        assert!(report.violations.iter().any(|v| v.contains("unknown resource")));
    }

    #[test]
    fn detects_horizon_violation() {
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R1",
            "2025-11-03T15:50:00",
            "2025-11-03T16:30:00",
        )];
        let report = validate(&request(), &assignments);
        assert!(report.violations.iter().any(|v| v.contains("horizon")));
    }

    #[test]
    fn matches_duplicate_capabilities_by_start_order() {
        let mut req = request();
        req.products[0].route = vec![
            Operation {
                capability: "fill".into(),
                duration_minutes: 10,
            },
            Operation {
                capability: "fill".into(),
                duration_minutes: 10,
            },
        ];
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:20:00", "2025-11-03T08:30:00"),
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T08:10:00"),
        ];
        let report = validate(&req, &assignments);
        assert!(report.is_valid(), "unexpected violations: {:?}", report.violations);
    }
}
