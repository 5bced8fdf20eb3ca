//! fieldops CLI - broadcast simulator and preview tool
//!
//! Runs the fanout engine against a seeded simulated provider:
//! - `simulate`: dispatch a broadcast and print the final report
//! - `preview`: show the confirmation screen without sending
//! - `report`: render a saved report

#![allow(missing_docs)]

pub mod console;
pub mod run;
pub mod simulator;

pub use console::{parse_target, CliConfig, ConsoleSession, JsonDirectory};
pub use run::{simulate, SimulationOutcome, SimulationRequest};
pub use simulator::{synthetic_directory, SimProfile, SimStats, SimulatedSender};

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`, defaulting to `info`. Logs go to stderr so stdout
/// carries only the operator transcript.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
