use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::pipeline::locator::EpisodeLocator;

pub mod crawler;

/**
    Locally persisted show/season/episode catalog.

    Built and refreshed by the crawler (`update-cache`), consumed by lookup;
    the resolution pipeline itself never touches it beyond the locators it
    yields. Stored as a single JSON document, written atomically.
*/
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// RFC 3339 time of the last crawl.
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub shows: Vec<ShowEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowEntry {
    pub id: u64,
    pub title: String,
    /// URL slug the provider addresses the show by.
    pub slug: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub synopsis: Option<String>,
    /// Empty for one-off shows and movies.
    #[serde(default)]
    pub seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonEntry {
    pub number: u32,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub number: u32,
    pub title: String,
    /// URL slug the provider addresses the episode by.
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ShowEntry {
    pub fn is_one_off(&self) -> bool {
        self.seasons.is_empty()
    }

    pub fn episode_total(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

impl Catalog {
    /// Default store location: `~/.config/vidgrab/catalog.json`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("vidgrab").join("catalog.json"))
            .context("no user config directory available")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read catalog '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("catalog '{}' is not valid", path.display()))
    }

    /// Write the catalog atomically: temp file in the same directory, then
    /// rename over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("catalog path has no parent")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create '{}'", parent.display()))?;

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.persist(path)
            .with_context(|| format!("cannot write catalog '{}'", path.display()))?;
        Ok(())
    }

    pub fn list_shows(&self) -> impl Iterator<Item = &ShowEntry> {
        self.shows.iter()
    }

    /// Case-insensitive substring search over titles and slugs.
    pub fn search(&self, needle: &str) -> Vec<&ShowEntry> {
        let needle = needle.to_lowercase();
        self.shows
            .iter()
            .filter(|show| {
                show.title.to_lowercase().contains(&needle)
                    || show.slug.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn find_show(&self, title: &str) -> Option<&ShowEntry> {
        self.shows.iter().find(|show| {
            show.title.eq_ignore_ascii_case(title) || show.slug.eq_ignore_ascii_case(title)
        })
    }

    /**
        Resolve a show (optionally narrowed to a season and episode numbers)
        into episode locators.

        Requested episode numbers that are not in the catalog are reported
        and skipped; the lookup only fails when nothing at all matches.
    */
    pub fn lookup(
        &self,
        show: &str,
        season: Option<u32>,
        episodes: Option<&[u32]>,
    ) -> Result<Vec<EpisodeLocator>> {
        let entry = self
            .find_show(show)
            .with_context(|| format!("show '{show}' is not in the catalog"))?;

        if entry.is_one_off() {
            if season.is_some() {
                bail!("'{}' is a one-off; it has no seasons", entry.title);
            }
            return Ok(vec![EpisodeLocator::show(entry.slug.clone())]);
        }

        let seasons: Vec<&SeasonEntry> = match season {
            Some(number) => {
                let season = entry
                    .seasons
                    .iter()
                    .find(|s| s.number == number)
                    .with_context(|| {
                        format!("season {number} of '{}' is not in the catalog", entry.title)
                    })?;
                vec![season]
            }
            None => entry.seasons.iter().collect(),
        };

        let mut locators = Vec::new();
        for season_entry in &seasons {
            for episode in &season_entry.episodes {
                if let Some(wanted) = episodes
                    && !wanted.contains(&episode.number)
                {
                    continue;
                }
                locators.push(EpisodeLocator::episode(
                    entry.slug.clone(),
                    season_entry.number.to_string(),
                    episode.slug.clone(),
                ));
            }
        }

        if let Some(wanted) = episodes {
            for number in wanted {
                let found = seasons
                    .iter()
                    .any(|s| s.episodes.iter().any(|e| e.number == *number));
                if !found {
                    eprintln!(
                        "[catalog] no episode {number} of '{}' in the requested season",
                        entry.title
                    );
                }
            }
        }

        if locators.is_empty() {
            bail!("no matching episodes of '{}' in the catalog", entry.title);
        }
        Ok(locators)
    }
}
