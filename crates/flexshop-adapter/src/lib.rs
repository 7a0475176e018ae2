//! # flexshop-adapter
//!
//! The adapter contract: a trait every vendor-specific adapter implements, a
//! registry that selects one by explicit tag or by structural
//! fingerprinting, and the identity adapter for the canonical JSON shape
//! itself; passing a canonical request through the registry is the
//! identity on the resulting CDM.
//!
//! No vendor-specific adapter (date-format inference, capability inference
//! from names) lives here; that logic is external to the core and out of
//! scope for this crate.

use flexshop_core::{ScheduleRequest, ValidationError};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// A single client's transform from its raw payload shape into the CDM.
pub trait ScheduleAdapter: Send + Sync {
    /// The tag this adapter registers under and matches on `client_id`.
    fn client_id(&self) -> &'static str;

    /// Does `raw` look like this adapter's native shape? Used by structural
    /// fingerprinting when no explicit `client_id` is present.
    fn recognizes(&self, raw: &Value) -> bool;

    /// Transform `raw` into a canonical, construction-validated request.
    fn to_cdm(&self, raw: &Value) -> Result<ScheduleRequest, AdapterError>;
}

/// Adapter selection or transformation failed.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("unknown client_id '{0}'")]
    UnknownClientId(String),

    #[error(
        "unable to detect client format from payload shape; provide an explicit client_id"
    )]
    UndetectableFormat,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The identity adapter: the canonical JSON shape *is* one of the adapter
/// targets, so transforming it is just deserialization into the CDM.
pub struct CanonicalAdapter;

impl ScheduleAdapter for CanonicalAdapter {
    fn client_id(&self) -> &'static str {
        "canonical"
    }

    fn recognizes(&self, raw: &Value) -> bool {
        raw.get("horizon").is_some() && raw.get("products").is_some() && raw.get("resources").is_some()
    }

    fn to_cdm(&self, raw: &Value) -> Result<ScheduleRequest, AdapterError> {
        Ok(serde_json::from_value::<ScheduleRequest>(raw.clone())?)
    }
}

/// Selects an adapter for a raw payload, either by an explicit `client_id`
/// tag or by structural fingerprinting over the registered adapters, in
/// registration order.
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Box<dyn ScheduleAdapter>>,
    order: Vec<&'static str>,
}

impl Default for AdapterRegistry {
    /// A registry with only the canonical (identity) adapter registered.
    fn default() -> Self {
        let mut registry = Self {
            adapters: HashMap::new(),
            order: Vec::new(),
        };
        registry.register(Box::new(CanonicalAdapter));
        registry
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client adapter. Adding client C, D, ... never
    /// requires modifying this registry.
    pub fn register(&mut self, adapter: Box<dyn ScheduleAdapter>) {
        let id = adapter.client_id();
        if !self.adapters.contains_key(id) {
            self.order.push(id);
        }
        self.adapters.insert(id, adapter);
    }

    /// Select an adapter for `raw`: an explicit `client_id` field wins;
    /// otherwise fall back to structural fingerprinting over every
    /// registered adapter in registration order.
    pub fn resolve(&self, raw: &Value) -> Result<&dyn ScheduleAdapter, AdapterError> {
        if let Some(client_id) = raw.get("client_id").and_then(Value::as_str) {
            return self
                .adapters
                .get(client_id)
                .map(|a| a.as_ref())
                .ok_or_else(|| AdapterError::UnknownClientId(client_id.to_string()));
        }

        self.order
            .iter()
            .filter_map(|id| self.adapters.get(id))
            .find(|a| a.recognizes(raw))
            .map(|a| a.as_ref())
            .ok_or(AdapterError::UndetectableFormat)
    }

    /// Resolve an adapter for `raw` and transform it into a canonical
    /// request in one step.
    pub fn to_cdm(&self, raw: &Value) -> Result<ScheduleRequest, AdapterError> {
        self.resolve(raw)?.to_cdm(raw)
    }
}
