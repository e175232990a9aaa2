//! rawblock demo driver
//!
//! Formats a store, writes a few small payloads and one payload large enough
//! to force growth, then prints the store report.

use clap::Parser;
use rand::Rng;
use rawblock::{StoreBuilder, StoreReport};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rawblock-demo")]
#[command(about = "Format a block store and exercise chained writes and growth")]
struct Args {
    /// Path of the store file (created or truncated)
    #[arg(default_value = "file.fs")]
    path: PathBuf,

    /// Requested block size in bytes
    #[arg(short = 'b', long, default_value_t = 4096)]
    block_size: u64,

    /// Requested initial block count
    #[arg(short = 'n', long, default_value_t = 8)]
    blocks: u64,

    /// Blocks in the large payload that forces growth
    #[arg(long, default_value_t = 10)]
    large_blocks: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut store = StoreBuilder::new()
        .path(&args.path)
        .block_size(args.block_size)
        .initial_blocks(args.blocks)
        .format()?;

    let samples: [&[u8]; 3] = [b"hello", b"world", b"what"];
    for payload in samples {
        let first = store.write(payload)?;
        info!("Wrote {:?} at block {}", String::from_utf8_lossy(payload), first);
    }

    let mut rng = rand::thread_rng();
    let large: Vec<u8> = (0..store.block_size() * args.large_blocks)
        .map(|_| rng.gen())
        .collect();
    let first = store.write(&large)?;
    let chain = store.chain(first)?;
    info!("Wrote {} random bytes as chain {:?}", large.len(), chain);

    store.flush()?;

    let report = StoreReport::from_store(&store);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }

    store.close()?;
    Ok(())
}
