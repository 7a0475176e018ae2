//! # flexshop-core
//!
//! Canonical data model (CDM) for the flexshop scheduling engine, plus the
//! integer-minute time arithmetic the constraint model is built on.
//!
//! This crate provides:
//! - The typed request (`ScheduleRequest` and its nested entities), with
//!   structural invariants validated once at construction.
//! - `Instant`/minutes conversions relative to a horizon's reference time.
//! - The output types (`Assignment`, `Kpis`) and the error surface
//!   (`ValidationError`) shared by every downstream crate.
//!
//! Solver and CP-specific concerns live in `flexshop-builder` and
//! `flexshop-solver`; this crate has no notion of a solver.

mod time;

pub use time::{from_minutes, horizon_bound, to_minutes};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub type ProductId = String;
pub type ResourceId = String;
pub type Capability = String;
pub type FamilyId = String;

/// A point in time, always normalized to UTC.
///
/// Accepts ISO-8601 with or without a timezone offset on deserialization;
/// a naive (offset-less) timestamp is interpreted as UTC.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Instant(pub DateTime<Utc>);

impl Instant {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Debug for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_instant(&raw)
            .map(Instant)
            .map_err(serde::de::Error::custom)
    }
}

/// Parse an ISO-8601 instant, assuming UTC when no offset is present.
fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("could not parse instant '{raw}': {e}"))
}

// ============================================================================
// Horizon
// ============================================================================

/// The global `[start, end]` interval within which every schedule lives.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Horizon {
    pub start: Instant,
    pub end: Instant,
}

// ============================================================================
// Resource
// ============================================================================

/// A half-open working window `[start, end)` on a resource's calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Instant,
    pub end: Instant,
}

/// A machine, cell, or operator capable of performing a set of capabilities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub capabilities: Vec<Capability>,
    pub calendar: Vec<Window>,
}

impl Resource {
    pub fn provides(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

// ============================================================================
// Operation / Product
// ============================================================================

/// A single step of a product's route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub capability: Capability,
    pub duration_minutes: i64,
}

/// A product to be routed through its operations, in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub family: FamilyId,
    pub due: Instant,
    pub route: Vec<Operation>,
}

impl Product {
    /// Sum of operation durations: the minimum possible route duration.
    pub fn minimum_duration_minutes(&self) -> i64 {
        self.route.iter().map(|op| op.duration_minutes).sum()
    }
}

// ============================================================================
// Changeover Matrix
// ============================================================================

/// Family-to-family setup minutes, keyed `"from->to"`. Missing entries
/// (including same-family transitions not listed explicitly) default to 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChangeoverMatrix {
    #[serde(default)]
    pub values: HashMap<String, i64>,
}

impl ChangeoverMatrix {
    pub fn minutes(&self, from: &str, to: &str) -> i64 {
        self.values
            .get(&format!("{from}->{to}"))
            .copied()
            .unwrap_or(0)
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub time_limit_seconds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_limit_seconds: 30,
        }
    }
}

// ============================================================================
// Request (validated CDM root)
// ============================================================================

/// The canonical, construction-validated scheduling request.
///
/// `ScheduleRequest::new` is the single entry point: it enforces every
/// structural invariant from the data model (non-empty routes, positive
/// durations, well-formed calendar windows, horizon containment, unique
/// product/resource ids) and returns a [`ValidationError`] naming the
/// offending field path on the first violation found. Once constructed, a
/// request is immutable and known-valid; no downstream crate re-checks
/// these invariants.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawScheduleRequest")]
pub struct ScheduleRequest {
    pub horizon: Horizon,
    pub resources: Vec<Resource>,
    pub products: Vec<Product>,
    pub changeover_matrix_minutes: ChangeoverMatrix,
    pub settings: Settings,
}

/// Wire-format mirror of [`ScheduleRequest`], deserialized first so the
/// invariants can be enforced by `TryFrom` rather than scattered across
/// field-level validators.
#[derive(Deserialize)]
struct RawScheduleRequest {
    horizon: Horizon,
    resources: Vec<Resource>,
    products: Vec<Product>,
    #[serde(default)]
    changeover_matrix_minutes: ChangeoverMatrix,
    #[serde(default)]
    settings: Settings,
}

impl TryFrom<RawScheduleRequest> for ScheduleRequest {
    type Error = ValidationError;

    fn try_from(raw: RawScheduleRequest) -> Result<Self, Self::Error> {
        ScheduleRequest::new(
            raw.horizon,
            raw.resources,
            raw.products,
            raw.changeover_matrix_minutes,
            raw.settings,
        )
    }
}

impl ScheduleRequest {
    pub fn new(
        horizon: Horizon,
        resources: Vec<Resource>,
        products: Vec<Product>,
        changeover_matrix_minutes: ChangeoverMatrix,
        settings: Settings,
    ) -> Result<Self, ValidationError> {
        if settings.time_limit_seconds == 0 {
            return Err(ValidationError::NonPositiveTimeLimit {
                time_limit_seconds: settings.time_limit_seconds,
            });
        }

        if horizon.end.0 <= horizon.start.0 {
            return Err(ValidationError::HorizonEndNotAfterStart {
                start: horizon.start,
                end: horizon.end,
            });
        }

        for (index, resource) in resources.iter().enumerate() {
            if resource.capabilities.is_empty() {
                return Err(ValidationError::ResourceHasNoCapabilities {
                    index,
                    id: resource.id.clone(),
                });
            }
            for (window_index, window) in resource.calendar.iter().enumerate() {
                if window.end.0 <= window.start.0 {
                    return Err(ValidationError::CalendarWindowNotPositive {
                        index,
                        id: resource.id.clone(),
                        window_index,
                        start: window.start,
                        end: window.end,
                    });
                }
                if window.start.0 < horizon.start.0 || window.end.0 > horizon.end.0 {
                    return Err(ValidationError::CalendarWindowOutsideHorizon {
                        index,
                        id: resource.id.clone(),
                        window_index,
                        start: window.start,
                        end: window.end,
                        horizon_start: horizon.start,
                        horizon_end: horizon.end,
                    });
                }
            }
            for other in &resources[..index] {
                if other.id == resource.id {
                    return Err(ValidationError::DuplicateResourceId {
                        id: resource.id.clone(),
                    });
                }
            }
        }

        for (index, product) in products.iter().enumerate() {
            if product.route.is_empty() {
                return Err(ValidationError::EmptyRoute {
                    index,
                    id: product.id.clone(),
                });
            }
            for (op_index, op) in product.route.iter().enumerate() {
                if op.capability.trim().is_empty() {
                    return Err(ValidationError::EmptyCapability {
                        index,
                        id: product.id.clone(),
                        op_index,
                    });
                }
                if op.duration_minutes <= 0 {
                    return Err(ValidationError::NonPositiveDuration {
                        index,
                        id: product.id.clone(),
                        op_index,
                        duration: op.duration_minutes,
                    });
                }
            }
            if product.due.0 < horizon.start.0 || product.due.0 > horizon.end.0 {
                return Err(ValidationError::DueOutsideHorizon {
                    index,
                    id: product.id.clone(),
                    due: product.due,
                    start: horizon.start,
                    end: horizon.end,
                });
            }
            for other in &products[..index] {
                if other.id == product.id {
                    return Err(ValidationError::DuplicateProductId {
                        id: product.id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            horizon,
            resources,
            products,
            changeover_matrix_minutes,
            settings,
        })
    }

    pub fn get_resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn get_product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

// ============================================================================
// Output types
// ============================================================================

/// A single solved operation: which product/op ran on which resource, when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub product: ProductId,
    pub op: Capability,
    pub resource: ResourceId,
    pub start: Instant,
    pub end: Instant,
}

/// Derived schedule quality metrics, all in whole minutes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpis {
    pub tardiness_minutes: i64,
    pub changeovers: i64,
    pub makespan_minutes: i64,
    pub utilization: HashMap<ResourceId, i64>,
}

/// The failure-shaped response payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleErrorPayload {
    pub error: String,
    pub why: Vec<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// CDM construction failed. Non-retryable: the request is malformed, not
/// merely infeasible.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("settings.time_limit_seconds must be positive, got {time_limit_seconds}")]
    NonPositiveTimeLimit { time_limit_seconds: u32 },

    #[error("horizon.end ({end}) must be strictly after horizon.start ({start})")]
    HorizonEndNotAfterStart { start: Instant, end: Instant },

    #[error("resources[{index}] ('{id}') declares no capabilities")]
    ResourceHasNoCapabilities { index: usize, id: ResourceId },

    #[error(
        "resources[{index}] ('{id}').calendar[{window_index}] end ({end}) must be after start ({start})"
    )]
    CalendarWindowNotPositive {
        index: usize,
        id: ResourceId,
        window_index: usize,
        start: Instant,
        end: Instant,
    },

    #[error(
        "resources[{index}] ('{id}').calendar[{window_index}] [{start}, {end}] lies outside the horizon [{horizon_start}, {horizon_end}]"
    )]
    CalendarWindowOutsideHorizon {
        index: usize,
        id: ResourceId,
        window_index: usize,
        start: Instant,
        end: Instant,
        horizon_start: Instant,
        horizon_end: Instant,
    },

    #[error("duplicate resource id '{id}'")]
    DuplicateResourceId { id: ResourceId },

    #[error("products[{index}] ('{id}') has an empty route")]
    EmptyRoute { index: usize, id: ProductId },

    #[error("products[{index}] ('{id}').route[{op_index}] has an empty capability")]
    EmptyCapability {
        index: usize,
        id: ProductId,
        op_index: usize,
    },

    #[error(
        "products[{index}] ('{id}').route[{op_index}] duration_minutes must be positive, got {duration}"
    )]
    NonPositiveDuration {
        index: usize,
        id: ProductId,
        op_index: usize,
        duration: i64,
    },

    #[error("products[{index}] ('{id}').due ({due}) lies outside the horizon [{start}, {end}]")]
    DueOutsideHorizon {
        index: usize,
        id: ProductId,
        due: Instant,
        start: Instant,
        end: Instant,
    },

    #[error("duplicate product id '{id}'")]
    DuplicateProductId { id: ProductId },
}
