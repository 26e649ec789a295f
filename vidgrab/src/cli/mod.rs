use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::catalog::Catalog;

mod fetch;
mod search;
mod update_cache;

pub use fetch::FetchCommand;
pub use search::SearchCommand;
pub use update_cache::UpdateCacheCommand;

#[derive(Parser, Debug)]
#[command(name = "vidgrab")]
#[command(about = "Resolve DRM-protected VOD episodes into decryptable streams")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve episodes (and optionally download, decrypt and mux them)
    Fetch(FetchCommand),
    /// Search the local catalog
    Search(SearchCommand),
    /// Crawl the provider's listings into the local catalog
    UpdateCache(UpdateCacheCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Fetch(cmd) => cmd.run().await,
            Command::Search(cmd) => cmd.run().await,
            Command::UpdateCache(cmd) => cmd.run().await,
        }
    }
}

/// Explicit `--catalog` path, or the default store location.
pub(crate) fn catalog_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => Catalog::default_path(),
    }
}
