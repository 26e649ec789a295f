use std::sync::Arc;

use futures::StreamExt;

use crate::cdm::Cdm;
use crate::config::{Config, USER_AGENT};
use crate::pipeline::keys::ContentKey;
use crate::pipeline::locator::EpisodeLocator;

pub mod envelope;
pub mod error;
pub mod keys;
pub mod locator;
pub mod metadata;
pub mod pssh;
pub mod rendition;
pub mod signing;

use error::PipelineError;

/// Season used when a one-off resolves without one.
const DEFAULT_SEASON: &str = "01";

/**
    Everything the external download/decrypt/mux stage needs to produce the
    final media file for one episode, and nothing more.
*/
#[derive(Debug, Clone)]
pub struct EpisodeStream {
    pub show_title: String,
    pub season_number: String,
    pub episode_number: String,
    pub episode_title: String,
    /// Canonical media-manifest document.
    pub mpd_url: String,
    /// Best-effort subtitle document; may not exist upstream.
    pub subtitles_url: Option<String>,
    /// The key downstream decryption uses.
    pub key: ContentKey,
    /// Every content key the license granted, for diagnostics.
    pub content_keys: Vec<ContentKey>,
}

/**
    The episode-resolution pipeline.

    Stages run strictly in order per episode (each stage's output is a hard
    input dependency of the next) and nothing is retried. Across episodes
    the pipeline is freely concurrent up to a worker bound: the provider
    endpoints are shared read-only and every resolution opens its own CDM
    session.
*/
pub struct Pipeline {
    config: Config,
    client: reqwest::Client,
    cdm: Arc<dyn Cdm>,
}

impl Pipeline {
    pub fn new(config: Config, cdm: Arc<dyn Cdm>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            cdm,
        })
    }

    /**
        Resolve one episode locator into a decryptable stream description.
    */
    pub async fn resolve(&self, locator: &EpisodeLocator) -> Result<EpisodeStream, PipelineError> {
        println!("[pipeline] resolving {locator}");

        let listing_url = locator.listing_url(&self.config.provider);
        let meta = metadata::fetch_episode(&self.client, &listing_url).await?;
        println!(
            "[pipeline] {} episode {} '{}' (asset {})",
            meta.show_title, meta.episode_number, meta.title, meta.id
        );

        let content_url = signing::signed_content_url(
            &self.config.provider,
            &self.config.hmac_secret,
            &meta.id,
            signing::unix_now(),
        );

        let sealed = metadata::fetch_envelope(&self.client, &content_url).await?;
        let manifest = envelope::open(&self.config.aes_key, &sealed)?;

        let rendition = rendition::select_protected(&manifest)?;
        println!("[pipeline] media manifest {}", rendition.mpd_url);

        let header = pssh::fetch_protection_header(&self.client, &rendition.mpd_url).await?;

        let acquired = keys::acquire_content_key(
            &self.client,
            self.cdm.as_ref(),
            &header,
            &rendition.license_url,
        )
        .await?;

        Ok(EpisodeStream {
            show_title: meta.show_title,
            season_number: meta
                .season_number
                .unwrap_or_else(|| DEFAULT_SEASON.to_string()),
            episode_number: meta.episode_number,
            episode_title: meta.title,
            mpd_url: rendition.mpd_url,
            subtitles_url: Some(rendition.subtitles_url),
            key: acquired.canonical,
            content_keys: acquired.all_content,
        })
    }

    /**
        Resolve a batch of locators with a bounded worker count.

        Failures are per-item values; one bad episode never aborts the rest
        of the batch. Results arrive in completion order.
    */
    pub async fn resolve_many(
        &self,
        locators: Vec<EpisodeLocator>,
        workers: usize,
    ) -> Vec<(EpisodeLocator, Result<EpisodeStream, PipelineError>)> {
        futures::stream::iter(locators)
            .map(|locator| self.tagged_resolve(locator))
            .buffer_unordered(workers.max(1))
            .collect()
            .await
    }

    async fn tagged_resolve(
        &self,
        locator: EpisodeLocator,
    ) -> (EpisodeLocator, Result<EpisodeStream, PipelineError>) {
        let result = self.resolve(&locator).await;
        if let Err(ref err) = result {
            eprintln!("[pipeline] {locator} failed: {err}");
        }
        (locator, result)
    }
}
