//! # flexshop-kpi
//!
//! The KPI calculator: tardiness, changeover count, makespan, and
//! per-resource utilization, derived purely from a request and a set of
//! assignments. Re-running this calculator on the assignments a solve
//! produced is how KPI reproducibility is checked; it takes no solver
//! state, only the public output.

use std::collections::HashMap;

use flexshop_core::{to_minutes, Assignment, Kpis, ResourceId, ScheduleRequest};

/// Compute every KPI from `assignments`.
pub fn calculate(request: &ScheduleRequest, assignments: &[Assignment]) -> Kpis {
    let mut by_product: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    let mut by_resource: HashMap<&str, Vec<&Assignment>> = HashMap::new();
    for a in assignments {
        by_product.entry(a.product.as_str()).or_default().push(a);
        by_resource.entry(a.resource.as_str()).or_default().push(a);
    }

    Kpis {
        tardiness_minutes: tardiness(request, &by_product),
        changeovers: changeovers(request, &by_resource),
        makespan_minutes: makespan(assignments),
        utilization: utilization(request, &by_resource),
    }
}

/// `sum_p max(0, completion(p) - due(p))`, in whole minutes.
fn tardiness(request: &ScheduleRequest, by_product: &HashMap<&str, Vec<&Assignment>>) -> i64 {
    let mut total = 0i64;
    for product in &request.products {
        let Some(ops) = by_product.get(product.id.as_str()) else {
            continue;
        };
        let completion = ops.iter().map(|a| a.end.0).max().expect("non-empty by construction");
        if completion > product.due.0 {
            total += to_minutes(flexshop_core::Instant::new(completion), product.due);
        }
    }
    total
}

/// Count of resource-level transitions between different product families,
/// sorted by start time; ties broken by product id. Ties should not occur
/// when no-overlap holds, but the tie-break keeps the count deterministic
/// if it ever does.
fn changeovers(request: &ScheduleRequest, by_resource: &HashMap<&str, Vec<&Assignment>>) -> i64 {
    let family_of: HashMap<&str, &str> = request
        .products
        .iter()
        .map(|p| (p.id.as_str(), p.family.as_str()))
        .collect();

    let mut total = 0i64;
    for ops in by_resource.values() {
        let mut sorted: Vec<&&Assignment> = ops.iter().collect();
        sorted.sort_by(|a, b| a.start.0.cmp(&b.start.0).then_with(|| a.product.cmp(&b.product)));

        for pair in sorted.windows(2) {
            let curr_family = family_of.get(pair[0].product.as_str());
            let next_family = family_of.get(pair[1].product.as_str());
            if let (Some(curr), Some(next)) = (curr_family, next_family) {
                if curr != next {
                    total += 1;
                }
            }
        }
    }
    total
}

/// `max(end) - min(start)` across all assignments; zero if empty.
fn makespan(assignments: &[Assignment]) -> i64 {
    let Some(earliest) = assignments.iter().map(|a| a.start.0).min() else {
        return 0;
    };
    let latest = assignments.iter().map(|a| a.end.0).max().expect("non-empty, checked above");
    to_minutes(flexshop_core::Instant::new(latest), flexshop_core::Instant::new(earliest))
}

/// `round_down(100 * busy / available)` per resource; `0` if the resource
/// has no available minutes at all.
fn utilization(
    request: &ScheduleRequest,
    by_resource: &HashMap<&str, Vec<&Assignment>>,
) -> HashMap<ResourceId, i64> {
    let mut out = HashMap::with_capacity(request.resources.len());
    for resource in &request.resources {
        let available: i64 = resource
            .calendar
            .iter()
            .map(|w| to_minutes(w.end, w.start))
            .sum();

        let busy: i64 = by_resource
            .get(resource.id.as_str())
            .map(|ops| ops.iter().map(|a| to_minutes(a.end, a.start)).sum())
            .unwrap_or(0);

        let pct = if available > 0 { (100 * busy) / available } else { 0 };
        out.insert(resource.id.clone(), pct);
    }
    out
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

    fn assignment(product: &str, op: &str, resource: &str, start: &str, end: &str) -> Assignment {
        Assignment {
            product: product.into(),
            op: op.into(),
            resource: resource.into(),
            start: instant(start),
            end: instant(end),
        }
    }

    fn base_request(families: &[(&str, &str)]) -> ScheduleRequest {
        let products = families
            .iter()
            .map(|(id, family)| Product {
                id: (*id).into(),
                family: (*family).into(),
                due: instant("2025-11-03T12:00:00"),
                route: vec![Operation {
                    capability: "fill".into(),
                    duration_minutes: 60,
                }],
            })
            .collect();
        ScheduleRequest::new(
            Horizon {
                start: instant("2025-11-03T08:00:00"),
                end: instant("2025-11-03T16:00:00"),
            },
            vec![Resource {
                id: "R1".into(),
                capabilities: vec!["fill".into()],
                calendar: vec![Window {
                    start: instant("2025-11-03T08:00:00"),
                    end: instant("2025-11-03T16:00:00"),
                }],
            }],
            products,
            ChangeoverMatrix::default(),
            Settings::default(),
        )
        .unwrap()
    }

    #[test]
    fn zero_assignments_gives_zero_kpis() {
        let request = base_request(&[]);
        let kpis = calculate(&request, &[]);
        assert_eq!(kpis.tardiness_minutes, 0);
        assert_eq!(kpis.changeovers, 0);
        assert_eq!(kpis.makespan_minutes, 0);
    }

    #[test]
    fn on_time_completion_has_zero_tardiness() {
        let request = base_request(&[("P1", "standard")]);
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R1",
            "2025-11-03T08:00:00",
            "2025-11-03T09:00:00",
        )];
        let kpis = calculate(&request, &assignments);
        assert_eq!(kpis.tardiness_minutes, 0);
    }

    #[test]
    fn late_completion_accrues_tardiness_in_minutes() {
        let request = base_request(&[("P1", "standard")]);
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R1",
            "2025-11-03T11:30:00",
            "2025-11-03T12:30:00",
        )];
        let kpis = calculate(&request, &assignments);
        assert_eq!(kpis.tardiness_minutes, 30);
    }

    #[test]
    fn changeover_counted_when_families_differ_on_same_resource() {
        let request = base_request(&[("P1", "standard"), ("P2", "premium")]);
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T09:00:00"),
            assignment("P2", "fill", "R1", "2025-11-03T09:00:00", "2025-11-03T10:00:00"),
        ];
        let kpis = calculate(&request, &assignments);
        assert_eq!(kpis.changeovers, 1);
    }

    #[test]
    fn no_changeover_when_families_match() {
        let request = base_request(&[("P1", "standard"), ("P2", "standard")]);
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T09:00:00"),
            assignment("P2", "fill", "R1", "2025-11-03T09:00:00", "2025-11-03T10:00:00"),
        ];
        let kpis = calculate(&request, &assignments);
        assert_eq!(kpis.changeovers, 0);
    }

    #[test]
    fn makespan_spans_earliest_start_to_latest_end() {
        let request = base_request(&[("P1", "standard"), ("P2", "standard")]);
        let assignments = vec![
            assignment("P1", "fill", "R1", "2025-11-03T08:00:00", "2025-11-03T09:00:00"),
            assignment("P2", "fill", "R1", "2025-11-03T09:00:00", "2025-11-03T10:00:00"),
        ];
        let kpis = calculate(&request, &assignments);
        assert_eq!(kpis.makespan_minutes, 120);
    }

    #[test]
    fn utilization_is_percentage_of_calendar_busy() {
        let request = base_request(&[("P1", "standard")]);
        let assignments = vec![assignment(
            "P1",
            "fill",
            "R1",
            "2025-11-03T08:00:00",
            "2025-11-03T09:00:00",
        )];
        let kpis = calculate(&request, &assignments);
        // 60 busy minutes / 480 available minutes = 12%
        assert_eq!(kpis.utilization["R1"], 12);
    }

    #[test]
    fn utilization_is_zero_for_resource_with_no_calendar() {
        let mut request = base_request(&[]);
        request.resources[0].calendar.clear();
        let kpis = calculate(&request, &[]);
        assert_eq!(kpis.utilization["R1"], 0);
    }
}
