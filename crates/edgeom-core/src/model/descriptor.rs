// ── Model descriptors ──
//
// Boot-time description of every model: which handler implements it,
// how its path segments are named, whether it is cached, and which
// refresh actions run against it.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One entry of the descriptor table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Locator of the handler implementation in the `HandlerCatalog`.
    #[serde(rename = "class")]
    pub implementation: String,

    /// Ordered names of the path segments (e.g. `["disk", "part"]`).
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub keys: Vec<String>,

    /// Local models are never cached; every read calls through.
    #[serde(default)]
    pub is_local: bool,

    /// Refresh actions keyed by `<Module>_<funcKey>`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub action: BTreeMap<String, ActionDescriptor>,

    /// Periodic refresh schedule. Models without one are only
    /// refreshed on demand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerEntry>,
}

impl ModelDescriptor {
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            ..Self::default()
        }
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    pub fn with_action(mut self, key: impl Into<String>, action: ActionDescriptor) -> Self {
        self.action.insert(key.into(), action);
        self
    }

    pub fn with_timer(mut self, timer: impl Into<TimerEntry>) -> Self {
        self.timer = Some(timer.into());
        self
    }
}

/// Keys are usually a list, but older tables carry a comma-separated string.
fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum KeysRepr {
        List(Vec<String>),
        Text(String),
    }

    Ok(match KeysRepr::deserialize(deserializer)? {
        KeysRepr::List(keys) => keys,
        KeysRepr::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
            .collect(),
    })
}

// ── Actions ─────────────────────────────────────────────────────────

/// Split an action key into `(module, func_key)`.
///
/// The module part becomes a lockable model name. Keys without a
/// non-empty module and func key are rejected.
pub fn split_action_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split('_');
    let module = parts.next().filter(|m| !m.is_empty())?;
    let func_key = parts.next().filter(|f| !f.is_empty())?;
    Some((module, func_key))
}

/// How one refresh action fetches its data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    /// Fetch the item list first, then each item.
    #[serde(default)]
    pub has_list: bool,

    /// `"Model,subKey"`: iterate a cached list, one pass per element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Model that change events are reported against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_resource_path: Option<String>,

    /// Semicolon-separated models purged alongside a removed item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_resource_path: Option<String>,
}

impl ActionDescriptor {
    /// Dependent models named by `childResourcePath`.
    pub fn child_models(&self) -> Vec<String> {
        self.child_resource_path
            .as_deref()
            .map(|paths| {
                paths
                    .split(';')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ── Timer settings ──────────────────────────────────────────────────

/// Upper bound for any refresh interval (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Schedule of a periodically refreshed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Skip the initial pass; the first refresh happens one interval later.
    #[serde(default)]
    pub delay: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default = "default_interval")]
    pub interval_time: u64,

    #[serde(default = "default_min_interval")]
    pub min_interval_time: u64,

    #[serde(default = "default_interval")]
    pub max_interval_time: u64,

    /// Number of passes; `0` runs forever.
    #[serde(default = "default_run_times")]
    pub run_times: i64,
}

fn default_interval() -> u64 {
    MAX_INTERVAL_SECS
}
fn default_min_interval() -> u64 {
    5
}
fn default_run_times() -> i64 {
    1
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: false,
            description: String::new(),
            interval_time: default_interval(),
            min_interval_time: default_min_interval(),
            max_interval_time: default_interval(),
            run_times: default_run_times(),
        }
    }
}

impl TimerSettings {
    /// Enabled timer ticking every `secs` seconds, forever.
    pub fn every(secs: u64) -> Self {
        Self {
            enabled: true,
            interval_time: secs,
            min_interval_time: secs.min(default_min_interval()),
            run_times: 0,
            ..Self::default()
        }
    }

    /// Check that the schedule can run. The error is a human-readable reason.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Err("Timer is disabled.".into());
        }
        if self.min_interval_time < 1 {
            return Err("minIntervalTime must be greater than 0.".into());
        }
        if self.max_interval_time > MAX_INTERVAL_SECS {
            return Err(format!("maxIntervalTime must not exceed {MAX_INTERVAL_SECS}."));
        }
        if self.interval_time < self.min_interval_time || self.interval_time > self.max_interval_time
        {
            return Err(
                "intervalTime must be between minIntervalTime and maxIntervalTime.".into(),
            );
        }
        if self.run_times < 0 {
            return Err("Timer is stopped.".into());
        }
        Ok(())
    }
}

/// A schedule as written in the descriptor table.
///
/// Unset fields fall back to the entry of the `parent` model, then to
/// the [`TimerSettings`] defaults. Inheritance is one level deep: the
/// parent's own `parent` is not followed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerEntry {
    /// Model whose timer entry supplies unset fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_times: Option<i64>,
}

impl TimerEntry {
    /// Entry with every field unset, inheriting from `parent`.
    pub fn inheriting(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    /// Fill unset fields from `parent` and the defaults.
    ///
    /// An entry that enables itself only runs when its parent is
    /// enabled too. Without a parent entry its own flag stands.
    pub fn resolve(&self, parent: Option<&TimerEntry>) -> TimerSettings {
        let empty = Self::default();
        let base = parent.unwrap_or(&empty);
        let defaults = TimerSettings::default();

        let enabled = match (self.enabled, parent) {
            (Some(true), Some(parent)) => parent.enabled.unwrap_or(false),
            (Some(own), _) => own,
            (None, _) => base.enabled.unwrap_or(defaults.enabled),
        };
        TimerSettings {
            enabled,
            delay: self.delay.or(base.delay).unwrap_or(defaults.delay),
            description: self
                .description
                .as_ref()
                .or(base.description.as_ref())
                .cloned()
                .unwrap_or(defaults.description),
            interval_time: self
                .interval_time
                .or(base.interval_time)
                .unwrap_or(defaults.interval_time),
            min_interval_time: self
                .min_interval_time
                .or(base.min_interval_time)
                .unwrap_or(defaults.min_interval_time),
            max_interval_time: self
                .max_interval_time
                .or(base.max_interval_time)
                .unwrap_or(defaults.max_interval_time),
            run_times: self.run_times.or(base.run_times).unwrap_or(defaults.run_times),
        }
    }
}

impl From<TimerSettings> for TimerEntry {
    fn from(settings: TimerSettings) -> Self {
        Self {
            parent: None,
            enabled: Some(settings.enabled),
            delay: Some(settings.delay),
            description: Some(settings.description),
            interval_time: Some(settings.interval_time),
            min_interval_time: Some(settings.min_interval_time),
            max_interval_time: Some(settings.max_interval_time),
            run_times: Some(settings.run_times),
        }
    }
}
