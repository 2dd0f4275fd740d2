//! Host-type dispatch for the run coordinator.
//!
//! A host whose `HostType` has no registered connector is reported as
//! unsupported and never gets a worker.

use std::collections::BTreeMap;
use std::fmt;

use super::Connector;

/// Maps a `HostType` string to the [`Connector`] that reaches hosts of that
/// type.
#[derive(Default)]
pub struct ConnectorRegistry {
    by_host_type: BTreeMap<String, Box<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the SSH connector, under `"ssh2"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(super::SshConnector::new());
        registry
    }

    /// Route hosts of `connector.host_type()` to `connector`. Returns the
    /// connector it displaces, if any.
    pub fn register(&mut self, connector: impl Connector + 'static) -> Option<Box<dyn Connector>> {
        self.by_host_type
            .insert(connector.host_type().to_string(), Box::new(connector))
    }

    pub fn get(&self, host_type: &str) -> Option<&dyn Connector> {
        self.by_host_type.get(host_type).map(Box::as_ref)
    }

    pub fn supports(&self, host_type: &str) -> bool {
        self.by_host_type.contains_key(host_type)
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_host_type.keys()).finish()
    }
}
