mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use edgeom_config::LogSettings;

use crate::cli::Cli;
use crate::error::CliError;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logging settings come from the settings file when it loads; a
    // broken file is reported by the command itself.
    let log = config::load_settings(&cli.global)
        .map(|settings| settings.log)
        .unwrap_or_default();
    init_tracing(cli.global.verbose, &log);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(&cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, log: &LogSettings) {
    let filter = match verbosity {
        0 => log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if log.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");
    commands::dispatch(&cli.command, &cli.global)
}
