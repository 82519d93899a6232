//! One-shot probe against the KaspaTrack backend: hits the portfolio
//! endpoint (and optionally the rest of the API surface) and prints the
//! response envelopes.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use kaspatrack::client::ApiClient;
use kaspatrack::config::{AppConfig, CONFIG_PATH};
use kaspatrack::types::ApiResponse;

#[derive(Parser)]
#[command(name = "probe_portfolio", about = "Probe the KaspaTrack backend API")]
struct Args {
    /// Kaspa address to query
    address: String,

    /// Also probe /health, /price/kaspa, and /transactions/{address}
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::resolve(Path::new(CONFIG_PATH))?;
    info!("Probing backend at {}", config.api.base_url);

    let client = ApiClient::new(&config.api.base_url)?;

    print_envelope("portfolio", &client.get_portfolio(&args.address).await);

    if args.all {
        print_envelope(
            "updates",
            &client.get_portfolio_updates(&args.address).await,
        );
        print_envelope("health", &client.health_check().await);
        print_envelope("price", &client.get_kaspa_price().await);
        print_envelope(
            "transactions",
            &client.get_transactions(&args.address).await,
        );
    }

    Ok(())
}

fn print_envelope<T: Serialize>(label: &str, response: &ApiResponse<T>) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("--- {label} ---\n{json}"),
        Err(e) => eprintln!("--- {label} --- (unprintable: {e})"),
    }
}
