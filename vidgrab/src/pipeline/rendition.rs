use serde::Deserialize;

use crate::pipeline::error::PipelineError;

/// DRM scheme tag the provider uses for Widevine-protected assets.
pub const WIDEVINE_SCHEME: &str = "widevine";

/**
    Plaintext manifest carried by the metadata envelope: the playable assets
    of one episode, each tagged with its DRM scheme. Exists only in memory.
*/
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub drm: Option<String>,
    /// License-server URL; present on protected assets.
    #[serde(default)]
    pub keyserver: Option<String>,
    #[serde(default)]
    pub renditions: Vec<Rendition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rendition {
    pub url: String,
}

/**
    The protected rendition's document URLs, derived from the manifest.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRendition {
    pub license_url: String,
    /// Canonical media-manifest document for the episode.
    pub mpd_url: String,
    /// Best-effort subtitle document; may not exist upstream.
    pub subtitles_url: String,
}

/**
    Select the first Widevine-protected asset and derive its document URLs.

    An episode with assets but none of them Widevine-protected is not an
    error in the episode itself; it is simply outside this pipeline's scope
    and reported as such.
*/
pub fn select_protected(manifest: &Manifest) -> Result<ProtectedRendition, PipelineError> {
    let asset = manifest
        .assets
        .iter()
        .find(|a| a.drm.as_deref() == Some(WIDEVINE_SCHEME))
        .ok_or(PipelineError::NoProtectedAsset)?;

    let license_url = asset
        .keyserver
        .clone()
        .ok_or_else(|| PipelineError::Parse("protected asset has no keyserver".into()))?;
    let rendition = asset
        .renditions
        .first()
        .ok_or_else(|| PipelineError::Parse("protected asset has no renditions".into()))?;

    let (mpd_url, subtitles_url) = derive_document_urls(&rendition.url)?;
    Ok(ProtectedRendition {
        license_url,
        mpd_url,
        subtitles_url,
    })
}

/**
    Derive the canonical manifest and subtitle document URLs from a rendition
    URL. The rendition filename's stem (everything before the first `_` or
    `-`) names both documents: `{stem}.mpd` and `{stem}_subtitles.mpd`.
*/
fn derive_document_urls(rendition_url: &str) -> Result<(String, String), PipelineError> {
    let (prefix, filename) = rendition_url
        .rsplit_once('/')
        .filter(|(_, filename)| !filename.is_empty())
        .ok_or_else(|| {
            PipelineError::Parse(format!("rendition URL '{rendition_url}' has no filename"))
        })?;

    let stem = filename.split(['_', '-']).next().unwrap_or(filename);
    Ok((
        format!("{prefix}/{stem}.mpd"),
        format!("{prefix}/{stem}_subtitles.mpd"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widevine_asset(keyserver: &str, rendition: &str) -> Asset {
        Asset {
            drm: Some(WIDEVINE_SCHEME.into()),
            keyserver: Some(keyserver.into()),
            renditions: vec![Rendition {
                url: rendition.into(),
            }],
        }
    }

    #[test]
    fn skips_unprotected_assets() {
        let manifest = Manifest {
            assets: vec![
                Asset {
                    drm: None,
                    keyserver: Some("https://keys.example/clear".into()),
                    renditions: vec![Rendition {
                        url: "https://cdn.example/r/clear_900.mpd".into(),
                    }],
                },
                widevine_asset("https://keys.example/wv", "https://cdn.example/r/show_900.mpd"),
            ],
        };

        let selected = select_protected(&manifest).unwrap();
        assert_eq!(selected.license_url, "https://keys.example/wv");
    }

    #[test]
    fn no_widevine_asset_is_reported() {
        let manifest = Manifest {
            assets: vec![Asset {
                drm: Some("fairplay".into()),
                keyserver: None,
                renditions: vec![],
            }],
        };
        let err = select_protected(&manifest).unwrap_err();
        assert!(matches!(err, PipelineError::NoProtectedAsset));
    }

    #[test]
    fn first_rendition_names_the_documents() {
        let manifest = Manifest {
            assets: vec![Asset {
                drm: Some(WIDEVINE_SCHEME.into()),
                keyserver: Some("https://keys.example/wv".into()),
                renditions: vec![
                    Rendition {
                        url: "https://cdn.example/r/episode3_1200k.mpd".into(),
                    },
                    Rendition {
                        url: "https://cdn.example/r/episode3_2400k.mpd".into(),
                    },
                ],
            }],
        };

        let selected = select_protected(&manifest).unwrap();
        assert_eq!(selected.mpd_url, "https://cdn.example/r/episode3.mpd");
        assert_eq!(
            selected.subtitles_url,
            "https://cdn.example/r/episode3_subtitles.mpd"
        );
    }

    #[test]
    fn stem_stops_at_dash_too() {
        let (mpd, subs) =
            derive_document_urls("https://cdn.example/r/episode3-hd_1200k.mpd").unwrap();
        assert_eq!(mpd, "https://cdn.example/r/episode3.mpd");
        assert_eq!(subs, "https://cdn.example/r/episode3_subtitles.mpd");
    }

    #[test]
    fn bare_filename_is_rejected() {
        assert!(derive_document_urls("episode3.mpd").is_err());
        assert!(derive_document_urls("https://cdn.example/r/").is_err());
    }

    #[test]
    fn manifest_deserializes_from_provider_json() {
        let json = r#"{
            "assets": [
                {"drm": "flashaccess", "renditions": [{"url": "https://cdn.example/fa_900.f4m"}]},
                {"drm": "widevine", "keyserver": "https://keys.example/wv",
                 "renditions": [{"url": "https://cdn.example/r/show_900.mpd"}]}
            ],
            "vendor": "ignored"
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let selected = select_protected(&manifest).unwrap();
        assert_eq!(selected.license_url, "https://keys.example/wv");
        assert_eq!(selected.mpd_url, "https://cdn.example/r/show.mpd");
    }
}
