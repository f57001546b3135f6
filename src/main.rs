//! Baton: cross-process coordination for pipeline workers.
//!
//! This is the main entry point for the `baton` CLI. It parses arguments,
//! dispatches to the appropriate command handler, prints the structured
//! result, and exits with the matching exit code.

pub mod admission;
mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod locks;
pub mod progress;
pub mod reaper;
pub mod sessions;
pub mod store;

#[cfg(test)]
mod test_support;

use cli::Cli;
use commands::Report;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    let report = match commands::dispatch(cli.state_dir.as_deref(), cli.command) {
        Ok(report) => report,
        Err(err) => {
            if err.is_infrastructure() {
                tracing::error!(error = %err, "coordination store failure");
            }
            Report::failure(&err)
        }
    };

    println!("{}", report.render());
    if let Some(message) = &report.message {
        // Print user-actionable error message to stderr
        eprintln!("Error: {}", message);
    }

    ExitCode::from(report.exit_code as u8)
}

/// Log to stderr so stdout stays a single JSON document. `RUST_LOG` wins
/// over `--verbose`.
fn init_logging(verbose: bool) {
    let default_directive = if verbose { "baton=debug" } else { "baton=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
