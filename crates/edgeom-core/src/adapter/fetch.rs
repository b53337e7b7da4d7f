// ── Resource fetch ──
//
// Cached reads, getter calls on a miss, and the refresher's variant
// that always calls through and promotes the first snapshot to "all".

use serde_json::Value;
use tracing::{debug, error, warn};

use super::{Adapter, StoreTarget};
use crate::config::AdapterConfig;
use crate::error::CoreError;
use crate::handler::{HandlerMethod, Invocation};
use crate::model::{CompositeKey, ModelDescriptor, ResourcePath, Status, string_form};

/// Sub key of the full snapshot.
pub const ALL: &str = "all";
/// Sub key of list views.
pub const ITEMS: &str = "items";

/// Parameters of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub model: String,
    pub sub_key: String,
    /// Take the value from the handler's `items` field.
    pub need_list: bool,
    /// Serve from the cache when possible.
    pub need_cache: bool,
    pub path: ResourcePath,
    pub cycle: u32,
    /// Model that change events are reported against.
    pub parent: Option<String>,
    /// Models purged alongside a removed list element.
    pub children: Vec<String>,
}

impl FetchRequest {
    pub fn new(model: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            sub_key: sub_key.into(),
            need_list: false,
            need_cache: true,
            path: ResourcePath::root(),
            cycle: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn list(mut self, need_list: bool) -> Self {
        self.need_list = need_list;
        self
    }

    pub fn cached(mut self, need_cache: bool) -> Self {
        self.need_cache = need_cache;
        self
    }

    pub fn at(mut self, path: ResourcePath) -> Self {
        self.path = path;
        self
    }

    pub fn cycle(mut self, cycle: u32) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    pub fn children(mut self, children: Vec<String>) -> Self {
        self.children = children;
        self
    }

    /// Sub key the result is cached under.
    pub fn storage_key(&self) -> &str {
        if self.need_list { ITEMS } else { &self.sub_key }
    }

    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.model.as_str(), self.path.clone())
    }
}

impl Adapter {
    /// Read a resource value.
    ///
    /// A cache hit consumes the resource's pending added/updated records
    /// and makes no handler call. A miss calls the getter and stores
    /// the result.
    pub fn fetch(&self, request: &FetchRequest) -> Result<Value, CoreError> {
        let descriptor = self.registry().lookup(&request.model)?;
        let key = request.key();

        if request.need_cache {
            if let Some(value) = self.cached(&request.model, request.storage_key(), &request.path) {
                debug!(key = %key, sub_key = request.storage_key(), "cache hit");
                self.inner.events.clear_read(&key);
                return Ok(value);
            }
        }

        let value = self.call_getter(descriptor, request, &key)?;

        let target = StoreTarget::new(&request.model, request.storage_key(), &request.path)
            .with_parent(request.parent.as_deref())
            .with_children(&request.children);
        if let Err(e) = self.store(value.clone(), &target) {
            error!(key = %key, error = %e, "failed to store fetched value");
            return Err(e);
        }
        Ok(value)
    }

    /// Fetch for the periodic refresher.
    ///
    /// Never served from the cache. List fetches and fetches of a
    /// resource with no cached full snapshot yet use the `"all"` getter.
    pub fn refresh(&self, request: FetchRequest) -> Result<Value, CoreError> {
        let mut request = request.cached(false);
        if request.need_list || self.cached(&request.model, ALL, &request.path).is_none() {
            request.sub_key = ALL.to_owned();
        }
        self.fetch(&request)
    }

    fn call_getter(
        &self,
        descriptor: &ModelDescriptor,
        request: &FetchRequest,
        key: &CompositeKey,
    ) -> Result<Value, CoreError> {
        let method = HandlerMethod::getter(request.sub_key.as_str());
        let bound = self
            .instances()
            .resolve(&descriptor.implementation, method, Some(key), !request.need_cache)
            .inspect_err(|e| warn!(key = %key, error = %e, "getter not resolved"))?;

        let invocation = Invocation::new(&request.path)
            .with_keys(&descriptor.keys)
            .with_cycle(request.cycle);
        let reply = bound
            .invoke(&invocation)
            .inspect_err(|e| error!(key = %key, method = %bound.method, error = %e, "getter failed"))?;
        if let Err(e) = reply.into_result() {
            self.log_getter_failure(key, descriptor, &e);
            return Err(e);
        }

        let rendered = bound.render();
        if !request.need_list {
            return Ok(rendered);
        }
        rendered.get(ITEMS).cloned().ok_or_else(|| {
            CoreError::Internal(format!("{} did not populate {ITEMS}", bound.method))
        })
    }

    fn log_getter_failure(&self, key: &CompositeKey, descriptor: &ModelDescriptor, err: &CoreError) {
        let CoreError::Handler { status, message } = err else {
            error!(key = %key, error = %err, "getter failed");
            return;
        };
        if *status != Status::NOT_EXIST {
            error!(key = %key, status = %status, message = %message, "getter failed");
            return;
        }

        if suppress_not_found(key, descriptor, self.config(), message) {
            return;
        }
        warn!(key = %key, message = %message, "resource not found");
    }
}

/// A NOT_EXIST answer is not worth logging when it comes from a
/// collection-level query (fewer path segments than the model has keys)
/// and its message matches a configured benign pattern.
fn suppress_not_found(
    key: &CompositeKey,
    descriptor: &ModelDescriptor,
    config: &AdapterConfig,
    message: &Value,
) -> bool {
    let collection_level = key.path.depth() < descriptor.keys.len().max(1);
    collection_level && config.is_benign(&string_form(message))
}
