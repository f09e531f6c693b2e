//! nlip-mesh - coordinator and worker services for an NLIP agent mesh.

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod coordinator;
mod error;
mod logging;
mod protocol;
mod registry;
mod transport;
mod worker;

use cli::{Command, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Commands::parse();

    let service = match &args.command {
        Command::Coordinator { .. } => "coordinator".to_string(),
        Command::Worker { capability, .. } => format!("worker-{}", capability),
        Command::Send { .. } => "send".to_string(),
        Command::Check => "check".to_string(),
    };

    // Keep the guard alive for the life of the process so buffered log lines
    // are flushed.
    let _guard = match logging::init(&service) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
