use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use kaspatrack::client::ApiClient;
use kaspatrack::config::{AppConfig, CONFIG_PATH};
use kaspatrack::input::AddressInputHandler;
use kaspatrack::reporter;
use kaspatrack::store::{PortfolioStore, REFRESH_INTERVAL};

#[derive(Parser)]
#[command(name = "dashboard", about = "KaspaTrack terminal portfolio dashboard")]
struct Args {
    /// Kaspa address to track immediately (otherwise read from stdin)
    #[arg(long)]
    address: Option<String>,

    /// Emit state as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,
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
    info!("Using backend at {}", config.api.base_url);

    let client = Arc::new(ApiClient::new(&config.api.base_url)?);
    let store = PortfolioStore::new(client);
    let input = AddressInputHandler::new(store.clone());

    if let Some(address) = &args.address {
        input.submit(address).await;
        render(&store, args.json).await;
    }

    info!("Enter a Kaspa address to track. Press Ctrl+C to stop.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Reprint roughly when the store's own refresh lands. The store owns the
    // actual refresh timer; this ticker only drives output.
    let mut render_tick = tokio::time::interval(REFRESH_INTERVAL);
    render_tick.tick().await; // first tick resolves immediately

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        input.submit(&line).await;
                        render(&store, args.json).await;
                    }
                    None => break,
                }
            }
            _ = render_tick.tick() => {
                if store.view().await.tracked_address.is_some() {
                    render(&store, args.json).await;
                }
            }
        }
    }

    store.shutdown().await;
    Ok(())
}

async fn render(store: &PortfolioStore, json: bool) {
    let view = store.view().await;
    if json {
        reporter::report_view(&view);
    } else {
        println!("{}", reporter::format_view(&view));
    }
}
