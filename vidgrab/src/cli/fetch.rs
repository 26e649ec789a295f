use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::catalog::Catalog;
use crate::cdm::WidevineCdm;
use crate::config::{Config, USER_AGENT};
use crate::download::{self, DownloadOptions};
use crate::pipeline::locator::EpisodeLocator;
use crate::pipeline::{EpisodeStream, Pipeline};

#[derive(Parser, Debug)]
pub struct FetchCommand {
    /// Episode page URL to resolve directly
    #[arg(long, conflicts_with_all = ["show", "season", "episode"])]
    pub url: Option<String>,

    /// Show title to look up in the local catalog
    #[arg(long, required_unless_present = "url")]
    pub show: Option<String>,

    /// Season number (with --show)
    #[arg(long, requires = "show")]
    pub season: Option<u32>,

    /// Episode number(s), comma separated (with --season)
    #[arg(long, value_delimiter = ',', requires = "season")]
    pub episode: Option<Vec<u32>>,

    /// Path to the catalog (default: ~/.config/vidgrab/catalog.json)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Concurrent resolutions when fetching several episodes
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Download, decrypt and mux after resolving
    #[arg(long, short = 'd')]
    pub download: bool,

    /// Also fetch subtitles
    #[arg(long, short = 's')]
    pub subtitles: bool,

    /// Prefer the audio-description track
    #[arg(long)]
    pub audio_description: bool,

    /// Plex-style `Season XX` output directories
    #[arg(long)]
    pub plex: bool,

    /// Overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

impl FetchCommand {
    pub async fn run(self) -> Result<()> {
        let config = Config::from_env()?;
        let cdm = WidevineCdm::load(&config.device_path)?;
        let locators = self.locators()?;
        let total = locators.len();

        let pipeline = Pipeline::new(config.clone(), Arc::new(cdm))?;

        // Dropping the batch future on interrupt cancels the in-flight
        // resolutions, which releases any open CDM sessions.
        let results = tokio::select! {
            results = pipeline.resolve_many(locators, self.jobs) => results,
            _ = tokio::signal::ctrl_c() => bail!("interrupted"),
        };

        let mut failures = 0;
        let mut resolved: Vec<EpisodeStream> = Vec::new();
        for (locator, result) in results {
            match result {
                Ok(stream) => {
                    print_stream(&stream);
                    resolved.push(stream);
                }
                Err(err) => {
                    failures += 1;
                    println!("  FAIL  {locator}");
                    println!("        {err}");
                    if let Some(hint) = err.operator_hint() {
                        println!("        hint: {hint}");
                    }
                }
            }
        }

        if self.download && !resolved.is_empty() {
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()?;
            let options = DownloadOptions {
                audio_description: self.audio_description,
                subtitles: self.subtitles,
                plex_layout: self.plex,
                force: self.force,
            };
            for stream in &resolved {
                if let Err(err) =
                    download::download_episode(&client, &config, stream, &options).await
                {
                    failures += 1;
                    eprintln!(
                        "[download] {} - {}: {err:#}",
                        stream.show_title, stream.episode_title
                    );
                }
            }
        }

        if failures > 0 {
            bail!("{failures} of {total} episode(s) failed");
        }
        Ok(())
    }

    fn locators(&self) -> Result<Vec<EpisodeLocator>> {
        if let Some(url) = &self.url {
            return Ok(vec![EpisodeLocator::parse(url)?]);
        }

        let show = self
            .show
            .as_deref()
            .context("either --url or --show is required")?;
        let path = super::catalog_path(self.catalog.as_ref())?;
        let catalog = Catalog::load(&path)
            .context("no usable catalog; run `vidgrab update-cache` first")?;
        catalog.lookup(show, self.season, self.episode.as_deref())
    }
}

fn print_stream(stream: &EpisodeStream) {
    println!(
        "  OK  {} S{}E{} - {}",
        stream.show_title, stream.season_number, stream.episode_number, stream.episode_title
    );
    println!("       manifest:  {}", stream.mpd_url);
    if let Some(subtitles) = &stream.subtitles_url {
        println!("       subtitles: {subtitles}");
    }
    println!("       key:       {}", stream.key);
    for extra in stream.content_keys.iter().skip(1) {
        println!("       also:      {extra}");
    }
}
