//! The action catalog — every capability the model may request lives here.
//!
//! Register descriptors and handlers at startup, then share the catalog
//! behind an `Arc`. Enable/disable toggles visibility without
//! unregistering: a disabled action disappears from the advertised schema
//! list and the runtime refuses to execute it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::action::{ActionDescriptor, ActionHandler, ActionSchema};
use crate::error::ActionError;

/// A registered action as handed out by [`ToolCatalog::lookup`].
#[derive(Clone)]
pub struct RegisteredAction {
    pub descriptor: ActionDescriptor,
    pub handler: Arc<dyn ActionHandler>,
    pub enabled: bool,
}

struct Entry {
    descriptor: ActionDescriptor,
    handler: Arc<dyn ActionHandler>,
    enabled: bool,
}

struct CatalogInner {
    entries: HashMap<String, Entry>,
    /// Registration order; keeps the advertised schema list reproducible.
    order: Vec<String>,
}

/// Registry of action descriptors and their handlers.
pub struct ToolCatalog {
    inner: RwLock<CatalogInner>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CatalogInner {
                entries: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Register an action. Fails if the name is already taken; descriptors
    /// are immutable once registered.
    pub fn register(
        &self,
        descriptor: ActionDescriptor,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), ActionError> {
        let mut inner = self.inner.write().unwrap();
        let name = descriptor.name.clone();
        if inner.entries.contains_key(&name) {
            return Err(ActionError::DuplicateName(name));
        }
        debug!(action = %name, tier = %descriptor.tier, "Registered action");
        inner.order.push(name.clone());
        inner.entries.insert(
            name,
            Entry {
                descriptor,
                handler,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Look up an action by name, enabled or not. The caller decides what a
    /// disabled entry means for it.
    pub fn lookup(&self, name: &str) -> Option<RegisteredAction> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(name).map(|entry| RegisteredAction {
            descriptor: entry.descriptor.clone(),
            handler: Arc::clone(&entry.handler),
            enabled: entry.enabled,
        })
    }

    /// Make an action visible again. Returns false for unknown names.
    pub fn enable(&self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Hide an action from the model and the runtime. Returns false for
    /// unknown names.
    pub fn disable(&self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.entries.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                debug!(action = %name, enabled, "Toggled action visibility");
                true
            }
            None => false,
        }
    }

    /// Schemas of all enabled actions, in registration order.
    pub fn list_enabled(&self) -> Vec<ActionSchema> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name))
            .filter(|entry| entry.enabled)
            .map(|entry| entry.descriptor.schema())
            .collect()
    }

    /// All descriptors regardless of visibility, in registration order.
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|name| inner.entries.get(name))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().unwrap().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
