//! Clap derive structures for the `edgeom` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// edgeom -- inspect and validate edge appliance resource models
#[derive(Debug, Parser)]
#[command(
    name = "edgeom",
    version,
    about = "Inspect and validate edge appliance resource models",
    long_about = "Operator tooling for the edgeom resource adapter.\n\n\
        Reads the settings file and the descriptor tables it names, then lists\n\
        models and refresh timers or checks the whole configuration.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "EDGEOM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "EDGEOM_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the merged descriptor table, or show one model
    #[command(alias = "m")]
    Models(ModelsArgs),

    /// List refresh timers and whether each one can run
    #[command(alias = "t")]
    Timers,

    /// Validate settings, descriptor tables, timers and action keys
    Check,
}

#[derive(Debug, Args)]
pub struct ModelsArgs {
    /// Model name to show in detail
    pub name: Option<String>,
}
