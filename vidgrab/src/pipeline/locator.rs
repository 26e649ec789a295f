use core::fmt;

use crate::config::ProviderConfig;
use crate::pipeline::error::PipelineError;

/**
    A reference to exactly one episode's listing endpoint.

    Two shapes are supported, matching the provider's site URLs:
    - `/show/{slug}`: resolves through the "next episode" alias, used for
      one-off shows and movies;
    - `/show/{slug}/seasons/{season}/episodes/{episode}`: a specific episode.

    Anything else is rejected outright; no guessing is attempted.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLocator {
    slug: String,
    episode: Option<(String, String)>,
}

impl EpisodeLocator {
    /// Locator for a show's "next episode" alias.
    pub fn show(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            episode: None,
        }
    }

    /// Locator for one specific episode of a season.
    pub fn episode(
        slug: impl Into<String>,
        season: impl Into<String>,
        episode: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            episode: Some((season.into(), episode.into())),
        }
    }

    /**
        Parse a user-supplied episode page URL (absolute or path-only).
    */
    pub fn parse(reference: &str) -> Result<Self, PipelineError> {
        let unsupported = || PipelineError::UnsupportedLocator(reference.to_string());

        let path = path_of(reference);
        let segments: Vec<&str> = path
            .split(['?', '#'])
            .next()
            .unwrap_or(path)
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            ["show", slug] => Ok(Self::show(*slug)),
            ["show", slug, "seasons", season, "episodes", episode] => {
                Ok(Self::episode(*slug, *season, *episode))
            }
            _ => Err(unsupported()),
        }
    }

    /**
        The listing-endpoint URL this locator resolves to. Unauthenticated;
        only the media metadata URL derived later carries a signature.
    */
    pub fn listing_url(&self, provider: &ProviderConfig) -> String {
        let base = &provider.shows_base;
        let platform = &provider.platform;
        match &self.episode {
            None => format!(
                "{base}/{slug}/episodes/next.json?platform={platform}&friendly=1",
                slug = self.slug,
            ),
            Some((season, episode)) => format!(
                "{base}/{slug}/seasons/{season}/episodes/{episode}.json?platform={platform}&friendly=1&linear=true",
                slug = self.slug,
            ),
        }
    }
}

impl fmt::Display for EpisodeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.episode {
            None => write!(f, "/show/{}", self.slug),
            Some((season, episode)) => {
                write!(
                    f,
                    "/show/{}/seasons/{season}/episodes/{episode}",
                    self.slug
                )
            }
        }
    }
}

/// Path component of a reference: everything after the authority for
/// absolute URLs, the whole string otherwise.
fn path_of(reference: &str) -> &str {
    match reference.find("://") {
        Some(scheme_end) => {
            let rest = &reference[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => "",
            }
        }
        None => reference,
    }
}
