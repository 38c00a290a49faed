mod io;
mod trend;

use clap::{Parser, Subcommand};
use std::env;

#[derive(Parser)]
#[command(
    name = "invtrend",
    about = "Inventory trends from warehouse scan records, downsampled for plotting"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build per-product quantity trends from scan records
    Trend(trend::Opts),
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let mut log_builder = env_logger::builder();
    if env::var_os("RUST_LOG").is_none() {
        log_builder.filter_level(log::LevelFilter::Info);
    }
    log_builder.init();

    let cli = Cli::parse();
    match cli.command {
        Command::Trend(opts) => trend::trend(&opts).await,
    }
}
