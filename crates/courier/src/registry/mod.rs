//! Service bindings keyed by interface name and version.
//!
//! The [`ServiceRegistry`] maps each [`BindingKey`] to a [`ServiceHandler`].
//! It is populated once by wiring code and then shared read-only with the
//! dispatcher, so recovery never touches it. Duplicate registrations for the
//! same key are rejected.

mod handler;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_types::BindingKey;
use thiserror::Error;

pub use self::handler::{InvocationError, MethodTable, ServiceHandler};

/// Errors raised while populating a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handler is already bound to the key.
    #[error("service '{key}' is already registered")]
    DuplicateBinding {
        /// Conflicting binding.
        key: BindingKey,
    },
}

/// Registry of service handlers.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    bindings: HashMap<BindingKey, Arc<dyn ServiceHandler>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `interface_name` at `version`. An empty version
    /// registers the default binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBinding`] if the key is taken.
    pub fn register(
        &mut self,
        interface_name: &str,
        version: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> Result<(), RegistryError> {
        let key = BindingKey::new(interface_name, version);
        if self.bindings.contains_key(&key) {
            return Err(RegistryError::DuplicateBinding { key });
        }
        self.bindings.insert(key, handler);
        Ok(())
    }

    /// Builder form of [`ServiceRegistry::register`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBinding`] if the key is taken.
    pub fn with_service(
        mut self,
        interface_name: &str,
        version: &str,
        handler: Arc<dyn ServiceHandler>,
    ) -> Result<Self, RegistryError> {
        self.register(interface_name, version, handler)?;
        Ok(self)
    }

    /// Looks up the handler bound to `interface_name` at `version`.
    #[must_use]
    pub fn resolve(&self, interface_name: &str, version: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.resolve_key(&BindingKey::new(interface_name, version))
    }

    /// Looks up the handler bound to `key`.
    #[must_use]
    pub fn resolve_key(&self, key: &BindingKey) -> Option<Arc<dyn ServiceHandler>> {
        self.bindings.get(key).cloned()
    }

    /// Registered keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<BindingKey> {
        let mut keys: Vec<BindingKey> = self.bindings.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceRegistry")
            .field("bindings", &self.keys())
            .finish()
    }
}
