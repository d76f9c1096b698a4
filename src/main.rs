mod build;
mod catalog;
mod cli;
mod config;
mod error;
mod language;
mod naming;
mod output;
mod pipeline;
mod process;
mod reconcile;
mod report;
mod source;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting Hydrogit");
    let code = cli.execute().await?;

    // Exit directly with the analyzer's status: an interrupted target prompt
    // can leave a blocking stdin read the runtime would otherwise wait on.
    std::process::exit(code)
}
