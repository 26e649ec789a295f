use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::{Catalog, EpisodeEntry, SeasonEntry, ShowEntry};
use crate::config::ProviderConfig;
use crate::pipeline::metadata::{de_opt_display_string, get_text};

/**
    Crawl the provider's listing API into a fresh catalog.

    The walk is shows → seasons → episodes, the same order the provider's
    own site loads them. This is plain CRUD against unauthenticated
    endpoints; the resolution pipeline never runs during a crawl.
*/
pub async fn crawl(client: &reqwest::Client, provider: &ProviderConfig) -> Result<Catalog> {
    let base = &provider.shows_base;
    let platform = &provider.platform;

    let search: SearchResponse = fetch_json(
        client,
        &format!("{base}/search.json?platform={platform}&friendly=1"),
    )
    .await?;
    println!("[crawler] provider lists {} show(s)", search.shows.len());

    let mut shows = Vec::with_capacity(search.shows.len());
    for record in search.shows {
        let seasons_url =
            format!("{base}/{}/seasons.json?platform={platform}&friendly=1", record.slug);
        let seasons: SeasonsResponse = fetch_json(client, &seasons_url).await?;

        let mut entry = ShowEntry {
            id: record.id,
            title: record.title,
            slug: record.slug,
            genre: record.genre,
            synopsis: record.synopsis,
            seasons: Vec::new(),
        };

        for season in seasons.seasons {
            // Seasons without a number are the provider's way of flagging a
            // one-off; the show then resolves via the next-episode alias.
            let Some(number) = season.number else {
                continue;
            };

            let episodes_url = format!(
                "{base}/{slug}/seasons/{number}/episodes.json?platform={platform}&friendly=1&linear=true",
                slug = entry.slug,
            );
            let episodes: EpisodesResponse = fetch_json(client, &episodes_url).await?;

            entry.seasons.push(SeasonEntry {
                number,
                episode_count: season.episode_count.unwrap_or(episodes.episodes.len() as u32),
                episodes: episodes
                    .episodes
                    .into_iter()
                    .filter_map(EpisodeRecord::into_entry)
                    .collect(),
            });
        }

        println!(
            "[crawler] {}: {} season(s), {} episode(s)",
            entry.title,
            entry.seasons.len(),
            entry.episode_total()
        );
        shows.push(entry);
    }

    Ok(Catalog {
        updated_at: Some(chrono::Utc::now().to_rfc3339()),
        shows,
    })
}

/**
    What changed between two crawls.
*/
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub shows: usize,
    pub new_shows: usize,
    pub new_episodes: usize,
    pub removed_episodes: usize,
}

/**
    Compare a fresh crawl against the previous catalog. Returns the tallies
    plus human-readable change lines in catalog order.
*/
pub fn diff(previous: &Catalog, current: &Catalog) -> (CrawlReport, Vec<String>) {
    let mut report = CrawlReport {
        shows: current.shows.len(),
        ..CrawlReport::default()
    };
    let mut changes = Vec::new();

    for show in &current.shows {
        let Some(old_show) = previous.shows.iter().find(|s| s.id == show.id) else {
            report.new_shows += 1;
            report.new_episodes += show.episode_total();
            changes.push(format!("new show: {}", show.title));
            continue;
        };

        for season in &show.seasons {
            let Some(old_season) = old_show.seasons.iter().find(|s| s.number == season.number)
            else {
                report.new_episodes += season.episodes.len();
                changes.push(format!(
                    "new season for {}: season {}",
                    show.title, season.number
                ));
                continue;
            };

            if season.episode_count > old_season.episode_count {
                changes.push(format!(
                    "extra episodes of {}, season {}: was {} now {}",
                    show.title, season.number, old_season.episode_count, season.episode_count
                ));
            }
            if season.episode_count < old_season.episode_count {
                changes.push(format!(
                    "episodes removed from {}, season {}: was {} now {}",
                    show.title, season.number, old_season.episode_count, season.episode_count
                ));
            }

            for episode in &season.episodes {
                if !old_season.episodes.iter().any(|e| e.number == episode.number) {
                    report.new_episodes += 1;
                    changes.push(format!(
                        "new episode: {} S{:02}E{:02} - {}",
                        show.title, season.number, episode.number, episode.title
                    ));
                }
            }
            for episode in &old_season.episodes {
                if !season.episodes.iter().any(|e| e.number == episode.number) {
                    report.removed_episodes += 1;
                }
            }
        }
    }

    (report, changes)
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let body = get_text(client, url).await?;
    serde_json::from_str(&body).with_context(|| format!("unexpected response from {url}"))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    shows: Vec<ShowRecord>,
}

#[derive(Debug, Deserialize)]
struct ShowRecord {
    id: u64,
    title: String,
    #[serde(rename = "f_name")]
    slug: String,
    #[serde(default, rename = "s_desc")]
    synopsis: Option<String>,
    #[serde(default)]
    genre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonsResponse {
    #[serde(default)]
    seasons: Vec<SeasonRecord>,
}

#[derive(Debug, Deserialize)]
struct SeasonRecord {
    #[serde(default, rename = "seasonNumber")]
    number: Option<u32>,
    #[serde(default, rename = "numberOfEpisodes")]
    episode_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    #[serde(default)]
    episodes: Vec<EpisodeRecord>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "f_name")]
    slug: Option<String>,
    #[serde(default, rename = "ep_num", deserialize_with = "de_opt_display_string")]
    number: Option<String>,
    #[serde(default, rename = "s_desc")]
    description: Option<String>,
}

impl EpisodeRecord {
    /// Records missing a number or slug cannot be addressed later; drop them.
    fn into_entry(self) -> Option<EpisodeEntry> {
        let number = self.number?.parse().ok()?;
        let slug = self.slug?;
        Some(EpisodeEntry {
            number,
            title: self.title.unwrap_or_else(|| format!("Episode {number}")),
            slug,
            description: self.description,
        })
    }
}
