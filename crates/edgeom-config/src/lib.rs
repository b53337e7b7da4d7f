//! Settings and descriptor-table loading for edgeom.
//!
//! A TOML settings file (with `EDGEOM_` environment overrides) names the
//! descriptor tables and tunes the adapter. This crate reads both and
//! translates them into `edgeom_core` types; the core never touches disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use edgeom_core::{AdapterConfig, ClassRegistry, ModelDescriptor};

/// File name of the primary descriptor table inside the config directory.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "ClassMap.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("descriptor table {} is malformed: {source}", path.display())]
    Descriptors {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub descriptors: DescriptorPaths,

    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub adapter: AdapterSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// Where the descriptor tables live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DescriptorPaths {
    /// Primary table. Relative paths resolve against the settings file.
    #[serde(default = "default_primary")]
    pub primary: PathBuf,

    /// Optional extension table; its entries override the primary ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<PathBuf>,
}

impl Default for DescriptorPaths {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            extension: None,
        }
    }
}

fn default_primary() -> PathBuf {
    PathBuf::from(DEFAULT_DESCRIPTOR_FILE)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pause between per-item fetches of a list refresh, in milliseconds.
    #[serde(default = "default_item_pause")]
    pub item_pause_ms: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            item_pause_ms: default_item_pause(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_item_pause() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdapterSettings {
    /// NOT_EXIST messages not worth logging on collection-level queries.
    #[serde(default = "default_benign")]
    pub benign_not_found: Vec<String>,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            benign_not_found: default_benign(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_benign() -> Vec<String> {
    AdapterConfig::default().benign_not_found
}
fn default_event_capacity() -> usize {
    AdapterConfig::default().event_capacity
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_level")]
    pub level: String,

    /// `"text"` or `"json"`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "warn".into()
}
fn default_format() -> String {
    "text".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Directory holding the settings file and, by default, the descriptor tables.
pub fn config_dir() -> PathBuf {
    ProjectDirs::from("org", "edgeom", "edgeom").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("edgeom");
            p
        },
        |dirs| dirs.config_dir().to_path_buf(),
    )
}

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// ── Config loading ──────────────────────────────────────────────────

/// Load settings from the canonical path plus the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load settings from `path` plus the environment. A missing file
/// leaves every setting at its default.
///
/// Nested keys are separated by a double underscore in the environment,
/// e.g. `EDGEOM_REFRESH__ITEM_PAUSE_MS=50`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EDGEOM_").split("__"));

    let mut config: Config = figment.extract()?;
    let base = path.parent().map_or_else(config_dir, Path::to_path_buf);
    config.descriptors.primary = resolve(&base, &config.descriptors.primary);
    config.descriptors.extension = config
        .descriptors
        .extension
        .as_deref()
        .map(|ext| resolve(&base, ext));
    Ok(config)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize settings to TOML and write them to the canonical path.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &config_path())
}

/// Serialize settings to TOML and write them to `path`, creating its directory.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "settings saved");
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

/// Build the adapter's runtime tuning from the settings.
pub fn adapter_config(config: &Config) -> Result<AdapterConfig, ConfigError> {
    if config.adapter.event_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "adapter.event_capacity".into(),
            reason: "must be greater than 0".into(),
        });
    }
    Ok(AdapterConfig {
        benign_not_found: config.adapter.benign_not_found.clone(),
        event_capacity: config.adapter.event_capacity,
        refresh_item_pause: Duration::from_millis(config.refresh.item_pause_ms),
    })
}

// ── Descriptor tables ───────────────────────────────────────────────

/// Read one descriptor table: a JSON object keyed by model name.
pub fn load_descriptor_table(path: &Path) -> Result<BTreeMap<String, ModelDescriptor>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: BTreeMap<String, ModelDescriptor> =
        serde_json::from_str(&text).map_err(|source| ConfigError::Descriptors {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), models = table.len(), "descriptor table loaded");
    Ok(table)
}

/// Load the primary table and merge the extension table over it.
///
/// A configured extension table that does not exist is skipped.
pub fn load_registry(config: &Config) -> Result<ClassRegistry, ConfigError> {
    let primary = load_descriptor_table(&config.descriptors.primary)?;
    let extension = match config.descriptors.extension.as_deref() {
        Some(path) if path.exists() => load_descriptor_table(path)?,
        Some(path) => {
            debug!(path = %path.display(), "extension descriptor table not found, skipping");
            BTreeMap::new()
        }
        None => BTreeMap::new(),
    };
    Ok(ClassRegistry::merged(primary, extension))
}
