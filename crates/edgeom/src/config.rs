//! CLI-side settings resolution: `--config` overrides the platform path.

use std::path::PathBuf;

use edgeom_config::Config;
use edgeom_core::ClassRegistry;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Settings file in effect for this invocation.
pub fn settings_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(edgeom_config::config_path)
}

pub fn load_settings(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = settings_path(global);
    tracing::debug!(path = %path.display(), "loading settings");
    Ok(edgeom_config::load_config_from(&path)?)
}

/// Settings plus the merged descriptor table.
pub fn load_registry(global: &GlobalOpts) -> Result<(Config, ClassRegistry), CliError> {
    let settings = load_settings(global)?;
    let registry = edgeom_config::load_registry(&settings)?;
    Ok((settings, registry))
}
