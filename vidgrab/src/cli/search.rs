use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use crate::catalog::{Catalog, ShowEntry};

#[derive(Parser, Debug)]
pub struct SearchCommand {
    /// Title substring to search for; omit to list every show
    pub query: Option<String>,

    /// Also list each episode
    #[arg(long)]
    pub list: bool,

    /// Path to the catalog (default: ~/.config/vidgrab/catalog.json)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

impl SearchCommand {
    pub async fn run(self) -> Result<()> {
        let path = super::catalog_path(self.catalog.as_ref())?;
        let catalog = Catalog::load(&path)?;

        let shows: Vec<&ShowEntry> = match &self.query {
            Some(query) => catalog.search(query),
            None => catalog.list_shows().collect(),
        };
        if shows.is_empty() {
            bail!("no shows match; try `vidgrab update-cache` first");
        }

        for show in shows {
            if show.is_one_off() {
                println!("{} (one-off)", show.title);
                continue;
            }

            println!(
                "{} - {} season(s), {} episode(s)",
                show.title,
                show.seasons.len(),
                show.episode_total()
            );
            if self.list {
                for season in &show.seasons {
                    for episode in &season.episodes {
                        println!(
                            "  S{:02}E{:02} - {}",
                            season.number, episode.number, episode.title
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
