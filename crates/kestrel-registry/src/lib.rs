//! Name to handler registry.
//!
//! A handler is anything that turns one payload into another, or signals
//! failure by returning `None`. Registration replaces any existing handler
//! under the same name; lookup never exposes iteration order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kestrel_wire::{Payload, MAX_NAME_LEN};
use parking_lot::RwLock;

/// Something that can answer a CALL. Implementors must be safe to invoke
/// from any worker thread.
pub trait Handler: Send + Sync {
    /// Produces the reply payload for `payload`, or `None` if the call
    /// could not be satisfied (surfaced to the caller as a failure reply,
    /// never a panic).
    fn call(&self, payload: Payload) -> Option<Payload>;
}

impl<F> Handler for F
where
    F: Fn(Payload) -> Option<Payload> + Send + Sync,
{
    fn call(&self, payload: Payload) -> Option<Payload> {
        self(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    EmptyName,
    NameTooLong { len: usize, max: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::EmptyName => write!(f, "registry name must not be empty"),
            RegistryError::NameTooLong { len, max } => {
                write!(f, "registry name length {len} exceeds maximum {max}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Name-keyed store of handlers. Cheap to clone: internally an
/// `Arc<RwLock<HashMap<..>>>` would also work, but callers are expected to
/// hold a `Registry` behind their own `Arc`, matching how the server engine
/// shares it across worker threads.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `handler` under `name`. Replaces any handler previously
    /// registered under the same name. Rejects empty or overlong names
    /// before ever touching the map.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RegistryError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        let replaced = self.handlers.write().insert(name.clone(), handler);
        if replaced.is_some() {
            tracing::debug!(name = %name, "replaced existing handler registration");
        } else {
            tracing::debug!(name = %name, "registered handler");
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.write().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
