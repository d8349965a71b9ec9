//! # Arkham
//!
//! Supply-chain risk monitoring and rerouting agent.
//!
//! ```text
//! arkham serve [--host H] [--port P]
//! arkham assess <origin> <destination> [--region R]... [--json]
//! arkham optimize <origin> <destination> [--priority P] [--max N]
//! arkham routes
//! arkham disrupt [--seed S]
//! arkham export-logs <path>
//! ```

use std::process::ExitCode;

use arkham::Config;
use arkham::cli::{self, Cli};
use clap::Parser;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "arkham=info,arkham_core=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    let default = if config.debug {
        "arkham=debug,arkham_core=debug,tower_http=debug"
    } else {
        DEFAULT_FILTER
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli::run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
