mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Effective};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // .env must be applied before clap reads `env = ...` fallbacks.
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cmd::serve::run(eff).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
