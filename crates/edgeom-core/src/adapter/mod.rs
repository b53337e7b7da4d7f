// ── Resource adapter ──
//
// The object every consumer shares: the class registry, the handler
// instance cache, the resource cache and the event bus, constructed
// once at process start. Reads go through `fetch`, requests (writes
// included) through `invoke` and `request`, cache maintenance through
// `store`.

mod fetch;
mod store;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AdapterConfig;
use crate::handler::{HandlerCatalog, InstanceCache};
use crate::model::{CompositeKey, ResourcePath};
use crate::registry::ClassRegistry;
use crate::store::{EventBus, EventKind, ResourceCache};
use crate::stream::ResourceEventStream;

pub use fetch::FetchRequest;
pub use store::StoreTarget;

/// Shared resource adapter.
///
/// Cheaply cloneable via `Arc<AdapterInner>`. Every operation is
/// synchronous and may block on a handler call; async callers should
/// run them on the blocking pool.
#[derive(Clone)]
pub struct Adapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    config: AdapterConfig,
    registry: ClassRegistry,
    instances: InstanceCache,
    cache: ResourceCache,
    events: EventBus,
}

impl Adapter {
    pub fn new(config: AdapterConfig, registry: ClassRegistry, catalog: HandlerCatalog) -> Self {
        for (model, descriptor) in registry.iter() {
            if !catalog.contains(&descriptor.implementation) {
                warn!(
                    model,
                    class = %descriptor.implementation,
                    "no handler registered for model"
                );
            }
        }

        let cache = ResourceCache::new(registry.lockable_models());
        debug!(
            models = registry.len(),
            cached = cache.models().count(),
            "resource adapter initialised"
        );
        let events = EventBus::new(config.event_capacity);

        Self {
            inner: Arc::new(AdapterInner {
                config,
                registry,
                instances: InstanceCache::new(catalog),
                cache,
                events,
            }),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.inner.registry
    }

    pub fn instances(&self) -> &InstanceCache {
        &self.inner.instances
    }

    /// Whether values of `model` are cached at all.
    pub fn is_cacheable(&self, model: &str) -> bool {
        self.inner.cache.supports(model)
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe(&self) -> ResourceEventStream {
        ResourceEventStream::new(self.inner.events.subscribe())
    }

    /// Resources with a pending record of `kind`.
    pub fn pending(&self, kind: EventKind) -> Vec<CompositeKey> {
        self.inner.events.pending(kind)
    }

    // ── Cache reads ──────────────────────────────────────────────────

    /// Cached value without touching handlers or pending events.
    pub fn cached(&self, model: &str, sub_key: &str, path: &ResourcePath) -> Option<Value> {
        self.inner.cache.get(model, path, sub_key)
    }

    /// Look up a `"Model,subKey"` reference at the model's root path.
    pub fn resource_value(&self, params: &str) -> Option<Value> {
        let mut parts = params.split(',').map(str::trim);
        let model = parts.next().filter(|m| !m.is_empty())?;
        let sub_key = parts.next()?;
        self.cached(model, sub_key, &ResourcePath::root())
    }
}
