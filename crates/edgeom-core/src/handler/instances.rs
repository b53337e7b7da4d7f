// ── Handler instance cache ──
//
// Lazily loads handler classes and memoizes at most one instance per
// (locator, composite key). Reads of already-cached classes and
// instances are lock-free (DashMap); only first-time class load and
// first-time instance creation take the registry mutex.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BoundMethod, HandlerCatalog, HandlerFactory, HandlerMethod, ResourceHandler};
use crate::error::CoreError;
use crate::model::CompositeKey;

/// Outcome of the first load of a locator. Failure is terminal.
#[derive(Clone)]
enum ClassSlot {
    Loaded(HandlerFactory),
    Missing,
}

type InstanceKey = (String, CompositeKey);

pub struct InstanceCache {
    catalog: HandlerCatalog,
    registry_lock: Mutex<()>,
    classes: DashMap<String, ClassSlot>,
    instances: DashMap<InstanceKey, Arc<dyn ResourceHandler>>,
}

impl InstanceCache {
    pub fn new(catalog: HandlerCatalog) -> Self {
        Self {
            catalog,
            registry_lock: Mutex::new(()),
            classes: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Resolve `method` on a handler for `locator`.
    ///
    /// With `want_caching` and a key, the instance is shared with every
    /// later call for that key. Otherwise a fresh instance is built.
    pub fn resolve(
        &self,
        locator: &str,
        method: HandlerMethod,
        key: Option<&CompositeKey>,
        want_caching: bool,
    ) -> Result<BoundMethod, CoreError> {
        let factory = self.load_class(locator)?;

        let handler = match key {
            Some(key) if want_caching => self.cached_instance(locator, key, &factory),
            _ => factory(),
        };

        if !handler.supports(&method) {
            return Err(CoreError::NotFound(format!(
                "Function name: {method} is not found."
            )));
        }
        Ok(BoundMethod { handler, method })
    }

    /// Drop the cached instance for `(locator, key)`, if any.
    pub fn purge(&self, locator: &str, key: &CompositeKey) -> bool {
        let _guard = self.registry_lock.lock();
        let removed = self
            .instances
            .remove(&(locator.to_owned(), key.clone()))
            .is_some();
        if removed {
            info!(key = %key, "handler instance removed");
        }
        removed
    }

    pub fn is_cached(&self, locator: &str, key: &CompositeKey) -> bool {
        self.instances
            .contains_key(&(locator.to_owned(), key.clone()))
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn load_class(&self, locator: &str) -> Result<HandlerFactory, CoreError> {
        let slot = match self.classes.get(locator).map(|s| s.value().clone()) {
            Some(slot) => slot,
            None => {
                let _guard = self.registry_lock.lock();
                self.classes
                    .entry(locator.to_owned())
                    .or_insert_with(|| match self.catalog.get(locator) {
                        Some(factory) => {
                            debug!(locator, "handler class loaded");
                            ClassSlot::Loaded(factory)
                        }
                        None => ClassSlot::Missing,
                    })
                    .value()
                    .clone()
            }
        };

        match slot {
            ClassSlot::Loaded(factory) => Ok(factory),
            ClassSlot::Missing => Err(CoreError::NotFound(format!(
                "Class name: {} is not found.",
                class_name(locator)
            ))),
        }
    }

    fn cached_instance(
        &self,
        locator: &str,
        key: &CompositeKey,
        factory: &HandlerFactory,
    ) -> Arc<dyn ResourceHandler> {
        let instance_key = (locator.to_owned(), key.clone());
        if let Some(handler) = self.instances.get(&instance_key).map(|h| Arc::clone(h.value())) {
            return handler;
        }

        let _guard = self.registry_lock.lock();
        let entry = self.instances.entry(instance_key).or_insert_with(|| {
            debug!(key = %key, "handler instance created");
            factory()
        });
        Arc::clone(entry.value())
    }
}

/// Short class name of a dotted locator (`systems.disk.Partition` → `Partition`).
fn class_name(locator: &str) -> &str {
    locator.rsplit('.').next().unwrap_or(locator)
}
