use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ProviderConfig;
use crate::util::b64;

type HmacSha256 = Hmac<Sha256>;

/// Current unix time in whole seconds, the granularity the metadata endpoint
/// validates signatures against.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/**
    Build the signed media metadata URL for a content id.

    The server recomputes the digest over the URL string up to (and not
    including) the `&auth=` parameter, so the construction must match
    byte-for-byte: seconds-granularity timestamp, standard base64 of the
    HMAC-SHA256 digest, converted to the URL-safe alphabet with padding
    stripped. The timestamp is a parameter so callers (and tests) control the
    clock; [`unix_now`] is the production value.
*/
pub fn signed_content_url(
    provider: &ProviderConfig,
    hmac_secret: &[u8],
    content_id: &str,
    timestamp: u64,
) -> String {
    let base = format!(
        "{media_base}/{app}/{content_id}.json?timestamp={timestamp}",
        media_base = provider.media_base,
        app = provider.app_name,
    );

    let mut mac =
        HmacSha256::new_from_slice(hmac_secret).expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    let digest = mac.finalize().into_bytes();

    let auth = b64::to_urlsafe_nopad(&BASE64.encode(&digest));
    format!("{base}&auth={auth}")
}
