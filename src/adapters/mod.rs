mod stripe;

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{Credential, Operation, Source};

pub use stripe::{StripeAdapter, encode_form_body};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    FormUrlEncoded,
}

/// Vendor-specific request/response shaping hook.
/// The first adapter in the registry whose `url_pattern` matches the
/// Source's base URL wins; absence of a match falls through to
/// `DefaultAdapter`.
pub trait VendorAdapter: Send + Sync {
    fn matches(&self, base_url: &str) -> bool;
    fn content_type(&self) -> ContentType;

    fn before_request(&self, args: Value, _op: &Operation, _source: &Source) -> Value {
        args
    }

    fn after_response(&self, body: Value, _op: &Operation, _source: &Source) -> Value {
        body
    }

    fn get_headers(&self, _source: &Source, _credential: &Credential) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Identity adapter used when nothing else matches.
pub struct DefaultAdapter;

impl VendorAdapter for DefaultAdapter {
    fn matches(&self, _base_url: &str) -> bool {
        true
    }

    fn content_type(&self) -> ContentType {
        ContentType::Json
    }
}

/// Ordered list of adapters, queried in registration order. The caller is
/// expected to register vendor-specific adapters first and rely on
/// `resolve` falling back to `DefaultAdapter` automatically.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn VendorAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: Vec::new() }
    }

    /// Registry seeded with the mandatory built-in Stripe adapter, honoring
    /// the config-level enable/disable toggle (SPEC_FULL.md §C).
    pub fn with_builtins(stripe_enabled: bool) -> Self {
        let mut registry = Self::new();
        if stripe_enabled {
            registry.register(Box::new(StripeAdapter));
        }
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn VendorAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn resolve(&self, base_url: &str) -> &dyn VendorAdapter {
        self.adapters
            .iter()
            .find(|a| a.matches(base_url))
            .map(Box::as_ref)
            .unwrap_or(&DefaultAdapter)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins(true)
    }
}
