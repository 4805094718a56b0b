use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use quorum_models::QuorumConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quorum", about = "Multi-provider LLM consensus trading signals")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/quorum.toml")]
    config: String,

    /// Trading pair symbol to produce a signal for
    #[arg(short, long)]
    symbol: String,

    /// Read the market-context text from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load config
    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: QuorumConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    // Read market context
    let market_context = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    // Build engine and run one consensus pass
    let engine = quorum::build_engine(&config).context("Failed to build engine")?;

    let outcome = quorum::run(&engine, &cli.symbol, &market_context)
        .await
        .map_err(|e| anyhow::anyhow!("Consensus run failed: {e}"))?;

    // Output outcome as JSON to stdout
    let output = if cli.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{output}");

    Ok(())
}
