//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use edgeom_config::ConfigError;
use edgeom_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Could not read {path}")]
    #[diagnostic(
        code(edgeom::unreadable),
        help(
            "Check that the file exists and is readable.\n\
             Descriptor paths are set under [descriptors] in the settings file."
        )
    )]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor table {path} is malformed")]
    #[diagnostic(
        code(edgeom::descriptors),
        help("The table must be a JSON object keyed by model name.")
    )]
    Descriptors {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(edgeom::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(edgeom::config),
        help("Settings are read from the TOML file given by --config and EDGEOM_* variables.")
    )]
    Config(Box<figment::Error>),

    // ── Models ───────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(
        code(edgeom::not_found),
        help("Run: edgeom models to see available models")
    )]
    NotFound(String),

    #[error("{problems} problem(s) found")]
    #[diagnostic(
        code(edgeom::check_failed),
        help("Fix the entries listed above and run: edgeom check")
    )]
    CheckFailed { problems: usize },

    // ── Core ─────────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(edgeom::core))]
    Core(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(edgeom::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(edgeom::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreadable { .. }
            | Self::Descriptors { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::NotFound(_) => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError / CoreError → CliError mapping ──────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Read { path, source } => Self::Unreadable {
                path: path.display().to_string(),
                source,
            },
            ConfigError::Descriptors { path, source } => Self::Descriptors {
                path: path.display().to_string(),
                source,
            },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Serialization(err) => Self::Core(format!("failed to serialize config: {err}")),
            ConfigError::Io(err) => Self::Io(err),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(message) => Self::NotFound(message),
            CoreError::InvalidInput(reason) => Self::Validation {
                field: "input".into(),
                reason,
            },
            other => Self::Core(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let err = CliError::from(CoreError::NotFound("Model name: Fan is not found.".into()));
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "Model name: Fan is not found.");

        let err = CliError::from(ConfigError::Validation {
            field: "adapter.event_capacity".into(),
            reason: "must be greater than 0".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);

        assert_eq!(CliError::CheckFailed { problems: 2 }.exit_code(), exit_code::GENERAL);
    }
}
