//! Isotask: split a markdown task list into isolated task units and run each
//! one through an external agent CLI, one at a time.
//!
//! This is the main entry point for the `isotask` CLI. It parses arguments,
//! sets up logging and signal handling, dispatches to the appropriate command
//! handler, and maps errors to exit codes.

mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod signals;
pub mod store;
pub mod supervisor;
pub mod task;
pub mod template;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);
    signals::install();

    match commands::dispatch(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(u8::MAX))
        }
    }
}
