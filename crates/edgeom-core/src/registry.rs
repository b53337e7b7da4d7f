// ── Class registry ──
//
// Model name → descriptor table, loaded once at boot and read-only
// afterwards. A secondary (extension) table overrides the primary one
// by model name.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ModelDescriptor, TimerEntry, TimerSettings};

/// Read-only table of model descriptors.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ClassRegistry {
    pub fn new(models: BTreeMap<String, ModelDescriptor>) -> Self {
        Self { models }
    }

    /// Union of two tables; entries of `extension` win on collision.
    pub fn merged(
        primary: BTreeMap<String, ModelDescriptor>,
        extension: BTreeMap<String, ModelDescriptor>,
    ) -> Self {
        let mut models = primary;
        for (name, descriptor) in extension {
            if models.insert(name.clone(), descriptor).is_some() {
                debug!(model = %name, "extension descriptor overrides primary entry");
            }
        }
        Self { models }
    }

    pub fn lookup(&self, model: &str) -> Result<&ModelDescriptor, CoreError> {
        self.models
            .get(model)
            .ok_or_else(|| CoreError::NotFound(format!("Model name: {model} is not found.")))
    }

    pub fn get(&self, model: &str) -> Option<&ModelDescriptor> {
        self.models.get(model)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelDescriptor)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Timer entry of `model`, if it declares one.
    pub fn timer_entry(&self, model: &str) -> Option<&TimerEntry> {
        self.models.get(model)?.timer.as_ref()
    }

    /// Resolved schedule of `model`, with unset fields taken from the
    /// entry its `parent` names. A parent without a timer entry is
    /// ignored.
    pub fn timer_settings(&self, model: &str) -> Option<TimerSettings> {
        let entry = self.timer_entry(model)?;
        let parent = entry.parent.as_deref().and_then(|name| {
            let parent = self.timer_entry(name);
            if parent.is_none() {
                warn!(model, parent = name, "timer parent has no timer entry");
            }
            parent
        });
        Some(entry.resolve(parent))
    }

    /// Names of every model that gets a cache slot and lock.
    ///
    /// Non-local models, plus the module prefix (text before the first
    /// `_`) of each of their action keys.
    pub fn lockable_models(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (name, descriptor) in &self.models {
            if descriptor.is_local {
                continue;
            }
            names.insert(name.clone());
            for action_key in descriptor.action.keys() {
                match action_key.find('_') {
                    Some(index) if index >= 1 => {
                        names.insert(action_key[..index].to_owned());
                    }
                    _ => {}
                }
            }
        }
        names
    }
}

impl FromIterator<(String, ModelDescriptor)> for ClassRegistry {
    fn from_iter<T: IntoIterator<Item = (String, ModelDescriptor)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
