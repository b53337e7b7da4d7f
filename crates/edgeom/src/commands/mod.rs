//! Command dispatch: bridges CLI args -> settings/registry -> output formatting.

pub mod check;
pub mod models;
pub mod timers;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub fn dispatch(cmd: &Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Models(args) => models::handle(args, global),
        Command::Timers => timers::handle(global),
        Command::Check => check::handle(global),
    }
}
