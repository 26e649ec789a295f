use anyhow::Result;
use clap::Parser;

mod catalog;
mod cdm;
mod cli;
mod config;
mod download;
mod naming;
mod pipeline;
mod util;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Args::parse().run().await
}
