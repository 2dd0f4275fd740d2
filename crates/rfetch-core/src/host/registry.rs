//! Host registry -- the immutable set of configured hosts, keyed by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::HostDefinition;

/// Every configured host, keyed by its unique name.
///
/// Built once from configuration and never mutated while a run is in
/// progress. Definitions are stored behind `Arc` so host workers can hold
/// them across task boundaries without copying command lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, HostDefinition>",
    into = "BTreeMap<String, HostDefinition>"
)]
pub struct HostRegistry {
    hosts: BTreeMap<String, Arc<HostDefinition>>,
}

impl HostRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host. A host with the same name is replaced and returned.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        host: HostDefinition,
    ) -> Option<Arc<HostDefinition>> {
        self.hosts.insert(name.into(), Arc::new(host))
    }

    /// Builder-style [`HostRegistry::insert`].
    pub fn with_host(mut self, name: impl Into<String>, host: HostDefinition) -> Self {
        self.insert(name, host);
        self
    }

    /// Look up a host by name.
    pub fn get(&self, name: &str) -> Option<&Arc<HostDefinition>> {
        self.hosts.get(name)
    }

    /// Iterate over `(name, definition)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<HostDefinition>)> {
        self.hosts.iter().map(|(name, host)| (name.as_str(), host))
    }

    /// Number of configured hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Return `true` if no hosts are configured.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl From<BTreeMap<String, HostDefinition>> for HostRegistry {
    fn from(hosts: BTreeMap<String, HostDefinition>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|(name, host)| (name, Arc::new(host)))
                .collect(),
        }
    }
}

impl From<HostRegistry> for BTreeMap<String, HostDefinition> {
    fn from(registry: HostRegistry) -> Self {
        registry
            .hosts
            .into_iter()
            .map(|(name, host)| (name, Arc::unwrap_or_clone(host)))
            .collect()
    }
}
