// ── Resource cache ──
//
// Last known value per (model, path, sub key). The set of cacheable
// models is fixed at construction; each model has its own mutex, held
// only for the map operation itself.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde_json::Value;

use crate::model::ResourcePath;

/// Sub key → value for one resource.
pub type CachedValue = BTreeMap<String, Value>;

#[derive(Debug, Default)]
pub struct ResourceCache {
    models: HashMap<String, Mutex<HashMap<ResourcePath, CachedValue>>>,
}

impl ResourceCache {
    pub fn new<I>(models: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            models: models
                .into_iter()
                .map(|model| (model, Mutex::new(HashMap::new())))
                .collect(),
        }
    }

    /// Whether `model` has a cache slot at all.
    pub fn supports(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn get(&self, model: &str, path: &ResourcePath, sub_key: &str) -> Option<Value> {
        let entries = self.models.get(model)?.lock();
        entries.get(path)?.get(sub_key).cloned()
    }

    /// Store a value. Returns `false` for models without a slot.
    pub fn put(&self, model: &str, path: &ResourcePath, sub_key: &str, value: Value) -> bool {
        let Some(slot) = self.models.get(model) else {
            return false;
        };
        slot.lock()
            .entry(path.clone())
            .or_default()
            .insert(sub_key.to_owned(), value);
        true
    }

    /// Drop every sub key cached for one resource.
    pub fn purge(&self, model: &str, path: &ResourcePath) -> bool {
        self.models
            .get(model)
            .is_some_and(|slot| slot.lock().remove(path).is_some())
    }

    pub fn entry(&self, model: &str, path: &ResourcePath) -> Option<CachedValue> {
        self.models.get(model)?.lock().get(path).cloned()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Number of cached resources across all models.
    pub fn len(&self) -> usize {
        self.models.values().map(|slot| slot.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
