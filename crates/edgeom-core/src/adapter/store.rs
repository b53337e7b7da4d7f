// ── Resource store ──
//
// Writes a value into the cache under the model's lock, then (outside
// the lock) diffs it against the previous baseline and propagates the
// change: pending events, cascading deletes, and write-back of partial
// changes into the full "all" snapshot.

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::Adapter;
use super::fetch::{ALL, ITEMS};
use crate::error::CoreError;
use crate::model::{CompositeKey, ResourcePath};
use crate::store::{Delta, EventKind, diff};

/// Where and how a value is stored.
#[derive(Debug, Clone, Copy)]
pub struct StoreTarget<'a> {
    pub model: &'a str,
    pub sub_key: &'a str,
    pub path: &'a ResourcePath,
    /// Diff and propagate. Write-backs into "all" disable this.
    pub send_event: bool,
    pub parent: Option<&'a str>,
    pub children: &'a [String],
}

impl<'a> StoreTarget<'a> {
    pub fn new(model: &'a str, sub_key: &'a str, path: &'a ResourcePath) -> Self {
        Self {
            model,
            sub_key,
            path,
            send_event: true,
            parent: None,
            children: &[],
        }
    }

    pub fn silent(mut self) -> Self {
        self.send_event = false;
        self
    }

    pub fn with_parent(mut self, parent: Option<&'a str>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_children(mut self, children: &'a [String]) -> Self {
        self.children = children;
        self
    }

    fn event_model(&self) -> &'a str {
        self.parent.unwrap_or(self.model)
    }
}

impl Adapter {
    /// Cache `value` and report what changed.
    ///
    /// Returns `Ok(None)` when the model is not cached or events are
    /// disabled for this write.
    pub fn store(&self, value: Value, target: &StoreTarget<'_>) -> Result<Option<Delta>, CoreError> {
        let cache = &self.inner.cache;
        if !cache.supports(target.model) {
            return Ok(None);
        }

        let mut baseline = cache.get(target.model, target.path, target.sub_key);
        let mut full_snapshot = None;
        let mut baseline_was_all = false;
        if target.sub_key != ALL && target.sub_key != ITEMS {
            full_snapshot = cache.get(target.model, target.path, ALL);
            if baseline.is_none() && full_snapshot.is_some() {
                baseline.clone_from(&full_snapshot);
                baseline_was_all = true;
            }
        }

        cache.put(target.model, target.path, target.sub_key, value.clone());

        if !target.send_event {
            return Ok(None);
        }

        let delta = diff(baseline.as_ref(), &value, baseline_was_all)?;
        self.propagate(&delta, target, full_snapshot)?;
        Ok(Some(delta))
    }

    /// Purge the list element `id` below `path` from each of `models`:
    /// cached values, handler instances and pending events.
    ///
    /// `id` takes the shallowest unset path segment. With all segments
    /// already set there is nowhere to put it and nothing is purged.
    pub fn delete_resource<I, S>(&self, models: I, id: &str, path: &ResourcePath)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(item_path) = path.child(id) else {
            debug!(id, path = %path, "all path segments set, nothing to delete");
            return;
        };

        for model in models {
            let model = model.as_ref();
            if self.inner.cache.purge(model, &item_path) {
                debug!(model, path = %item_path, "cached resource removed");
            }
            let key = CompositeKey::new(model, item_path.clone());
            if let Some(descriptor) = self.registry().get(model) {
                self.instances().purge(&descriptor.implementation, &key);
            }
            self.inner.events.forget(&key);
        }
    }

    fn propagate(
        &self,
        delta: &Delta,
        target: &StoreTarget<'_>,
        full_snapshot: Option<Value>,
    ) -> Result<(), CoreError> {
        let event_model = target.event_model();
        let event_key = CompositeKey::new(event_model, target.path.clone());

        match delta {
            Delta::Unchanged => {}
            Delta::Bootstrap(_) => {
                debug!(key = %event_key, sub_key = target.sub_key, "initial value cached");
            }
            Delta::Members { removed, added } => {
                for id in added {
                    info!(key = %event_key, id, "resource added");
                    self.inner
                        .events
                        .emit(EventKind::Added, item_key(event_model, target.path, id));
                }
                for id in removed {
                    info!(key = %event_key, id, "resource removed");
                    self.delete_resource(target.children, id, target.path);
                    self.delete_resource([target.model], id, target.path);
                    self.inner
                        .events
                        .emit(EventKind::Removed, item_key(event_model, target.path, id));
                }
            }
            Delta::Fields { changed, merged } => {
                info!(key = %event_key, fields = changed.len(), "resource updated");
                let all_target = StoreTarget::new(event_model, ALL, target.path).silent();
                if let Some(merged) = merged {
                    self.store(Value::Object(merged.clone()), &all_target)?;
                } else if let Some(Value::Object(all)) = full_snapshot {
                    self.store(Value::Object(apply_changes(all, changed)), &all_target)?;
                }
                self.inner.events.emit(EventKind::Updated, event_key);
            }
            Delta::Scalar(_) => {
                info!(key = %event_key, sub_key = target.sub_key, "resource updated");
                self.inner.events.emit(EventKind::Updated, event_key);
            }
        }
        Ok(())
    }
}

fn item_key(model: &str, path: &ResourcePath, id: &str) -> CompositeKey {
    let path = path.child(id).unwrap_or_else(|| path.clone());
    CompositeKey::new(model, path)
}

fn apply_changes(mut all: Map<String, Value>, changed: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in changed {
        all.insert(key.clone(), value.clone());
    }
    all
}
