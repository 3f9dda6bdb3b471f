use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::descriptor::{DescriptorSource, InterfaceDescriptor, MethodDescriptor};
use crate::error::{MapperError, Result};

struct Entry {
    snapshot: Arc<InterfaceDescriptor>,
    source: Option<Arc<dyn DescriptorSource>>,
}

/// Registry of interface descriptor snapshots.
///
/// Each interface is held as one `Arc` snapshot. [`reload`](Self::reload)
/// replaces the whole snapshot under the write lock, so a reader sees either
/// the old or the new method set, and keeps using whatever snapshot it already
/// cloned.
pub struct DescriptorStore {
    entries: RwLock<HashMap<String, Entry>>,
    refresh_on_access: bool,
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DescriptorStore {
    /// Creates an empty store. With `refresh_on_access` every lookup of a
    /// source-backed interface re-reads its source.
    pub fn new(refresh_on_access: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            refresh_on_access,
        }
    }

    /// Whether lookups re-resolve descriptors from their source.
    pub fn refresh_on_access(&self) -> bool {
        self.refresh_on_access
    }

    /// Validates and registers an interface, replacing any previous one.
    pub fn register(&self, iface: InterfaceDescriptor) -> Result<()> {
        self.install(iface, None)
    }

    /// Loads an interface from `source`, validates and registers it.
    pub fn register_source(&self, source: Arc<dyn DescriptorSource>) -> Result<()> {
        let iface = source.load()?;
        self.install(iface, Some(source))
    }

    /// Atomically replaces the descriptor set of one interface.
    ///
    /// The new set is validated before the swap; on failure the previous
    /// snapshot stays in place.
    pub fn reload(&self, iface: InterfaceDescriptor) -> Result<()> {
        let source = self
            .entries
            .read()
            .get(&iface.name)
            .and_then(|entry| entry.source.clone());
        self.install(iface, source)
    }

    /// Re-reads a source-backed interface and swaps it in.
    pub fn reload_from_source(&self, interface: &str) -> Result<()> {
        let source = self
            .entries
            .read()
            .get(interface)
            .and_then(|entry| entry.source.clone())
            .ok_or_else(|| {
                MapperError::Configuration(format!("interface '{interface}' has no source"))
            })?;
        let iface = load_named(source.as_ref(), interface)?;
        self.install(iface, Some(source))
    }

    fn install(
        &self,
        iface: InterfaceDescriptor,
        source: Option<Arc<dyn DescriptorSource>>,
    ) -> Result<()> {
        iface.validate()?;
        let name = iface.name.clone();
        let methods = iface.methods.len();
        let previous = self.entries.write().insert(
            name.clone(),
            Entry {
                snapshot: Arc::new(iface),
                source,
            },
        );
        info!(
            interface = %name,
            methods,
            replaced = previous.is_some(),
            "store.reload"
        );
        Ok(())
    }

    /// Returns the current snapshot of an interface.
    pub fn interface(&self, interface: &str) -> Result<Arc<InterfaceDescriptor>> {
        let (snapshot, source) = {
            let entries = self.entries.read();
            let entry = entries
                .get(interface)
                .ok_or_else(|| MapperError::not_found(interface, "*"))?;
            (Arc::clone(&entry.snapshot), entry.source.clone())
        };
        match source {
            Some(source) if self.refresh_on_access => {
                let fresh = load_named(source.as_ref(), interface)?;
                fresh.validate()?;
                debug!(interface, "store.refreshed");
                Ok(Arc::new(fresh))
            }
            _ => Ok(snapshot),
        }
    }

    /// Looks up one method, returning the interface snapshot it belongs to.
    pub fn get(
        &self,
        interface: &str,
        method: &str,
    ) -> Result<(Arc<InterfaceDescriptor>, MethodDescriptor)> {
        let snapshot = self.interface(interface)?;
        let found = snapshot
            .method_named(method)
            .cloned()
            .ok_or_else(|| MapperError::not_found(interface, method))?;
        Ok((snapshot, found))
    }

    /// Names of every registered interface, sorted.
    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn load_named(source: &dyn DescriptorSource, interface: &str) -> Result<InterfaceDescriptor> {
    let iface = source.load()?;
    if iface.name != interface {
        return Err(MapperError::Configuration(format!(
            "source for '{interface}' now declares '{}'",
            iface.name
        )));
    }
    Ok(iface)
}
