use core::fmt;

use crate::cdm::{Cdm, LicenseKey, LicenseKeyKind};
use crate::pipeline::error::PipelineError;

/**
    A content decryption key, `kid:key` in lowercase hex, the form the
    external decryption engine consumes.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKey {
    pub kid: String,
    pub key: String,
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid, self.key)
    }
}

/**
    Outcome of a license exchange: the canonical key downstream decryption
    uses, plus every content key the license granted, for diagnostics.
*/
#[derive(Debug, Clone)]
pub struct AcquiredKeys {
    pub canonical: ContentKey,
    pub all_content: Vec<ContentKey>,
}

/**
    Drive one license exchange: open a session, build the challenge from the
    protection header, POST it to the license server, parse the response and
    pick the content key.

    The session is owned by this scope and released when it drops: on the
    success path, on every error path, and when the caller's task is
    cancelled mid-exchange. Nothing is retried: a failing exchange means the
    device credential or the provider's keys have drifted.
*/
pub async fn acquire_content_key(
    client: &reqwest::Client,
    cdm: &dyn Cdm,
    protection_header: &[u8],
    license_url: &str,
) -> Result<AcquiredKeys, PipelineError> {
    let mut session = cdm.open_session()?;

    let challenge = session.license_challenge(protection_header)?;
    let response = post_challenge(client, license_url, challenge).await?;
    let keys = session.parse_license(&response)?;

    select_content_key(&keys)
}

/**
    Pick the canonical key from a parsed license.

    Licenses often carry several keys (signing, key-control, sometimes more
    than one content key); downstream decryption uses the FIRST content-typed
    key, and that ordinal choice is part of the provider contract.
*/
pub fn select_content_key(keys: &[LicenseKey]) -> Result<AcquiredKeys, PipelineError> {
    let all_content: Vec<ContentKey> = keys
        .iter()
        .filter(|key| key.kind == LicenseKeyKind::Content)
        .map(|key| ContentKey {
            kid: key.kid.clone(),
            key: key.key.clone(),
        })
        .collect();

    for key in &all_content {
        println!("[keys] content key {key}");
    }

    let canonical = all_content
        .first()
        .cloned()
        .ok_or(PipelineError::NoContentKey)?;
    Ok(AcquiredKeys {
        canonical,
        all_content,
    })
}

async fn post_challenge(
    client: &reqwest::Client,
    license_url: &str,
    challenge: Vec<u8>,
) -> Result<Vec<u8>, PipelineError> {
    let response = client
        .post(license_url)
        .header("Content-Type", "application/octet-stream")
        .header("Accept", "*/*")
        .body(challenge)
        .send()
        .await
        .map_err(|e| PipelineError::Network {
            url: license_url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::LicenseServer {
            status: status.as_u16(),
        });
    }

    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| PipelineError::Network {
            url: license_url.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::cdm::CdmSession;

    fn key(kid: &str, key: &str, kind: LicenseKeyKind) -> LicenseKey {
        LicenseKey {
            kid: kid.into(),
            key: key.into(),
            kind,
        }
    }

    #[test]
    fn first_content_key_is_canonical() {
        let keys = [
            key("aaaa", "1111", LicenseKeyKind::Other),
            key("bbbb", "2222", LicenseKeyKind::Content),
            key("cccc", "3333", LicenseKeyKind::Content),
        ];
        let acquired = select_content_key(&keys).unwrap();
        assert_eq!(acquired.canonical.to_string(), "bbbb:2222");
        assert_eq!(acquired.all_content.len(), 2);
    }

    #[test]
    fn license_without_content_keys_is_an_error() {
        let keys = [key("aaaa", "1111", LicenseKeyKind::Other)];
        let err = select_content_key(&keys).unwrap_err();
        assert!(matches!(err, PipelineError::NoContentKey));
    }

    /// Session stub whose release (drop) is observable.
    struct TrackedSession {
        released: Arc<AtomicBool>,
        fail_challenge: bool,
    }

    impl CdmSession for TrackedSession {
        fn license_challenge(&mut self, _header: &[u8]) -> Result<Vec<u8>, PipelineError> {
            if self.fail_challenge {
                return Err(PipelineError::Session("challenge refused".into()));
            }
            Ok(b"challenge".to_vec())
        }

        fn parse_license(&mut self, _response: &[u8]) -> Result<Vec<LicenseKey>, PipelineError> {
            Ok(vec![key("abcd", "1234", LicenseKeyKind::Content)])
        }
    }

    impl Drop for TrackedSession {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct TrackedCdm {
        released: Arc<AtomicBool>,
        fail_challenge: bool,
    }

    impl Cdm for TrackedCdm {
        fn open_session(&self) -> Result<Box<dyn CdmSession>, PipelineError> {
            Ok(Box::new(TrackedSession {
                released: self.released.clone(),
                fail_challenge: self.fail_challenge,
            }))
        }
    }

    #[tokio::test]
    async fn session_is_released_when_challenge_fails() {
        let released = Arc::new(AtomicBool::new(false));
        let cdm = TrackedCdm {
            released: released.clone(),
            fail_challenge: true,
        };

        // The challenge fails before any network I/O, so the license URL is
        // never contacted.
        let client = reqwest::Client::new();
        let err = acquire_content_key(&client, &cdm, b"header", "http://127.0.0.1:9/license")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Session(_)));
        assert!(released.load(Ordering::SeqCst), "session leaked");
    }
}
