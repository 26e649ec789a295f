use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::catalog::{Catalog, crawler};
use crate::config::{ProviderConfig, REQUEST_TIMEOUT, USER_AGENT};

#[derive(Parser, Debug)]
pub struct UpdateCacheCommand {
    /// Path to the catalog (default: ~/.config/vidgrab/catalog.json)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Start from an empty catalog even when one exists
    #[arg(long)]
    pub create: bool,
}

impl UpdateCacheCommand {
    pub async fn run(self) -> Result<()> {
        let path = super::catalog_path(self.catalog.as_ref())?;
        let previous = if self.create || !path.is_file() {
            Catalog::default()
        } else {
            Catalog::load(&path)?
        };

        // Crawling only touches unauthenticated listing endpoints, so no
        // secrets are required here.
        let provider = ProviderConfig::from_env();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        let current = crawler::crawl(&client, &provider).await?;
        let (report, changes) = crawler::diff(&previous, &current);
        for change in &changes {
            println!("[crawler] {change}");
        }

        current.save(&path)?;
        println!(
            "[crawler] saved {} show(s) to {} ({} new show(s), {} new episode(s))",
            report.shows,
            path.display(),
            report.new_shows,
            report.new_episodes,
        );
        Ok(())
    }
}
