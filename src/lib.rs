pub mod ai;
pub mod backend;
pub mod billing;
pub mod commands;
pub mod config;
pub mod payment;

use clap::Parser;
use commands::cli::Cli;
use commands::AppState;
use config::AppConfig;
use tracing_subscriber::EnvFilter;

/// Parse arguments, run one command, and return the process exit code
pub fn run() -> i32 {
    // Load .env file - try multiple locations
    // Check current dir first, then the parent (when run from a subdirectory)
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Initialize tracing with RUST_LOG env filter
    // Default: warn for most crates, info for our app
    // Use RUST_LOG=debug for verbose per-request logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,costume_studio_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("{}", e);
            return 2;
        }
    };

    let state = match AppState::open(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e);
            return 1;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            eprintln!("Failed to start: {}", e);
            return 1;
        }
    };

    match runtime.block_on(commands::dispatch(&state, cli.command)) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(message) => {
            eprintln!("{}", message);
            1
        }
    }
}
