mod cli;
mod fetch;
mod logging;
mod ticks;

use clap::Parser;
use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::setup_logging();
    tracing::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Ticks(args) => ticks::run(args),
        Command::Fetch(args) => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(fetch::run(args))
        }
    }
}
