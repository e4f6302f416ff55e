//! The named checks a run can select, and the registry mapping names to them.

use crate::context::RunContext;
use crate::findings::CheckUnit;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod doh_providers;
pub mod local_resolvers;
pub mod network_interfaces;
pub mod open_resolvers;
pub mod port_filtering;
pub mod root_servers;

/// A check body. It owns its unit; dropping the unit closes its sinks.
pub type CheckFn = fn(Arc<RunContext>, CheckUnit) -> BoxFuture<'static, ()>;

#[derive(Clone, Default)]
pub struct Registry {
    checks: BTreeMap<String, CheckFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check this crate ships.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(network_interfaces::NAME, network_interfaces::run);
        registry.register(local_resolvers::NAME, local_resolvers::run);
        registry.register(open_resolvers::NAME, open_resolvers::run);
        registry.register(open_resolvers::CLOUDFLARE.check, open_resolvers::run_cloudflare);
        registry.register(open_resolvers::GOOGLE.check, open_resolvers::run_google);
        registry.register(open_resolvers::QUAD9.check, open_resolvers::run_quad9);
        registry.register(root_servers::NAME, root_servers::run);
        registry.register(port_filtering::NAME, port_filtering::run);
        registry.register(doh_providers::NAME, doh_providers::run);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, check: CheckFn) {
        self.checks.insert(name.into(), check);
    }

    pub fn get(&self, name: &str) -> Option<CheckFn> {
        self.checks.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}
