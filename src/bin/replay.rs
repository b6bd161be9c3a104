//! Replay recorded L2 snapshots through the feed processor.
//!
//! Input is newline-delimited JSON, one snapshot per line, in the format the
//! live feed sends. Lines that do not decode are forwarded as transport
//! errors, exactly as a live connection would report them.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use flash_tca::logging::init_logging;
use flash_tca::{feed_channel, AnalyticsEngine, BookStore, BookUpdate, FeedMessage, FeedProcessor, TcaConfig};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay L2 snapshots and report execution-cost estimates", long_about = None)]
struct Args {
    /// Newline-delimited JSON snapshots
    #[arg(short, long)]
    input: PathBuf,

    /// JSON config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the tracked order quantity
    #[arg(short, long)]
    quantity: Option<f64>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match &args.config {
        Some(path) => TcaConfig::from_file(path)?,
        None => TcaConfig::default(),
    };
    if let Some(quantity) = args.quantity {
        config.feed.tracked_quantity = quantity;
        config.validate()?;
    }

    let store = Arc::new(BookStore::new(config.symbol.as_str()));
    let engine = AnalyticsEngine::new(store, config.analytics)?;
    let processor = FeedProcessor::new(engine, config.feed.clone())?;
    let (tx, rx) = feed_channel(&config.feed);
    let handle = processor.spawn(rx);

    info!(input = %args.input.display(), "replaying snapshots");
    let mut lines = BufReader::new(File::open(&args.input).await?).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message = match BookUpdate::from_json(&line) {
            Ok(update) => FeedMessage::Update(update),
            Err(e) => FeedMessage::Error(e.to_string()),
        };
        if tx.send(message).await.is_err() {
            break;
        }
    }
    // Receiver may already be gone if the processor stopped early
    let _ = tx.send(FeedMessage::ConnectionClosed).await;

    let report = handle.await?;

    println!("\n=== Replay Report ({}) ===", config.symbol);
    println!("Applied:          {}", report.stats.applied);
    println!("Rejected:         {}", report.stats.rejected);
    println!("Stale:            {}", report.stats.stale);
    println!("Transport errors: {}", report.stats.transport_errors);
    println!("---------------------------");
    println!("{}", report.latency);
    println!("---------------------------");

    match report.last_report {
        Some(last) => {
            let estimate = last.estimate;
            println!("Quantity:         {:.4}", estimate.quantity);
            println!("Best bid / ask:   {:.4} / {:.4}", last.best_bid, last.best_ask);
            if estimate.has_liquidity() {
                println!("Slippage:         {:.6}", estimate.slippage);
            } else {
                println!("Slippage:         -- (insufficient liquidity)");
            }
            println!("Market impact:    {:.6}", estimate.market_impact);
            println!("Fees:             {:.6}", estimate.fees);
            println!("Net cost:         {:.6}", estimate.net_cost);
            match estimate.maker_taker_probability {
                Some(p) => println!("Maker/taker:      {:.4}", p),
                None => println!("Maker/taker:      --"),
            }
        }
        None => println!("No snapshot was applied."),
    }

    Ok(())
}
