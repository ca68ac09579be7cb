use clap::Parser;
use tracing_subscriber::EnvFilter;

use bfsiqa::cli::{Cli, execute};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
