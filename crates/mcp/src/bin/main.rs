//! Binary entry point for the osagent-mcp server.

use clap::Parser;
use osagent_mcp::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    if let Err(e) = osagent_mcp::run(config).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}
