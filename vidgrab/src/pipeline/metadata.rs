use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::pipeline::envelope::Envelope;
use crate::pipeline::error::PipelineError;

/**
    Episode record returned by the listing endpoints. The provider is loose
    about numeric fields (season and episode numbers arrive as numbers or
    strings depending on the endpoint), so both are normalised to strings.
*/
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeMeta {
    /// Provider asset id the signed media URL is built from.
    #[serde(deserialize_with = "de_display_string")]
    pub id: String,
    #[serde(default)]
    pub vod_available: bool,
    #[serde(rename = "sea_num", default, deserialize_with = "de_opt_display_string")]
    pub season_number: Option<String>,
    #[serde(rename = "ep_num", deserialize_with = "de_display_string")]
    pub episode_number: String,
    #[serde(rename = "sh_title")]
    pub show_title: String,
    pub title: String,
}

/**
    Fetch and validate the episode record behind a listing URL.

    `vod_available == false` means the episode page exists but there is no
    stream to resolve; that is reported distinctly so a batch run can say
    "not available" instead of a confusing downstream failure.
*/
pub async fn fetch_episode(
    client: &reqwest::Client,
    listing_url: &str,
) -> Result<EpisodeMeta, PipelineError> {
    let body = get_text(client, listing_url).await?;
    let meta = parse_episode(&body)?;
    if !meta.vod_available {
        return Err(PipelineError::NotAvailable);
    }
    Ok(meta)
}

pub fn parse_episode(body: &str) -> Result<EpisodeMeta, PipelineError> {
    serde_json::from_str(body)
        .map_err(|e| PipelineError::Parse(format!("episode record: {e}")))
}

/**
    Fetch the encrypted envelope behind a signed media metadata URL.
*/
pub async fn fetch_envelope(
    client: &reqwest::Client,
    content_url: &str,
) -> Result<Envelope, PipelineError> {
    let body = get_text(client, content_url).await?;
    serde_json::from_str(&body)
        .map_err(|e| PipelineError::Parse(format!("metadata envelope: {e}")))
}

/// GET a URL as text, mapping transport failures and non-success statuses.
pub async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, PipelineError> {
    let response = client
        .get(url)
        .header("Accept", "*/*")
        .send()
        .await
        .map_err(|e| PipelineError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| PipelineError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn de_display_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

pub(crate) fn de_opt_display_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string, number or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_string_fields() {
        let meta = parse_episode(
            r#"{"id": 42, "vod_available": true, "sea_num": 1, "ep_num": "3",
                "sh_title": "Demo Show", "title": "Third"}"#,
        )
        .unwrap();
        assert_eq!(meta.id, "42");
        assert_eq!(meta.season_number.as_deref(), Some("1"));
        assert_eq!(meta.episode_number, "3");
        assert_eq!(meta.show_title, "Demo Show");
    }

    #[test]
    fn missing_season_is_none() {
        let meta = parse_episode(
            r#"{"id": "C5149790007", "vod_available": true, "ep_num": 1,
                "sh_title": "One Off", "title": "One Off"}"#,
        )
        .unwrap();
        assert_eq!(meta.season_number, None);
    }

    #[test]
    fn null_season_is_none() {
        let meta = parse_episode(
            r#"{"id": "C5", "vod_available": true, "sea_num": null, "ep_num": 1,
                "sh_title": "One Off", "title": "One Off"}"#,
        )
        .unwrap();
        assert_eq!(meta.season_number, None);
    }

    #[test]
    fn unexpected_shape_is_a_parse_error() {
        let err = parse_episode(r#"{"shows": []}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn boolean_id_rejected() {
        let err = parse_episode(
            r#"{"id": true, "vod_available": true, "ep_num": 1,
                "sh_title": "x", "title": "y"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
