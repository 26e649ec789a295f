use std::path::Path;

use crate::pipeline::error::PipelineError;

/**
    The content-decryption-module capability this pipeline drives.

    The challenge/response cryptography belongs to the DRM scheme, not to
    this crate; everything behind this seam is opaque. The production
    implementation wraps `drm-widevine`; tests substitute stubs.
*/
pub trait Cdm: Send + Sync {
    /// Open a license session. Every episode resolution opens its own
    /// session; a session is never shared across concurrent resolutions.
    fn open_session(&self) -> Result<Box<dyn CdmSession>, PipelineError>;
}

/**
    One open license session.

    Dropping the box releases the session; that is the only release path,
    so it holds on success, on any mid-pipeline error, and when the owning
    task is cancelled.
*/
pub trait CdmSession: Send {
    /// Build a license challenge from a protection header.
    fn license_challenge(&mut self, protection_header: &[u8]) -> Result<Vec<u8>, PipelineError>;

    /// Feed the license server's response back in and enumerate the keys it
    /// granted.
    fn parse_license(&mut self, response: &[u8]) -> Result<Vec<LicenseKey>, PipelineError>;
}

/// A key returned by a license exchange, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    pub kid: String,
    pub key: String,
    pub kind: LicenseKeyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseKeyKind {
    /// A media decryption key, the kind downstream decryption needs.
    Content,
    /// Signing, key-control and other protocol-internal keys.
    Other,
}

/**
    Widevine CDM backed by a locally provisioned device credential.
*/
pub struct WidevineCdm {
    device: drm_widevine::Device,
}

impl WidevineCdm {
    /**
        Load a WVD v2 device credential from disk.
    */
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read device credential '{}': {e}",
                path.display()
            ))
        })?;
        let device = drm_widevine::Device::from_bytes(&bytes)
            .map_err(|e| PipelineError::Session(format!("invalid device credential: {e}")))?;
        Ok(Self { device })
    }
}

impl Cdm for WidevineCdm {
    fn open_session(&self) -> Result<Box<dyn CdmSession>, PipelineError> {
        Ok(Box::new(WidevineSession {
            session: drm_widevine::Session::new(self.device.clone()),
        }))
    }
}

struct WidevineSession {
    session: drm_widevine::Session,
}

impl CdmSession for WidevineSession {
    fn license_challenge(&mut self, protection_header: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let pssh = drm_widevine::core::PsshBox::from_bytes(protection_header)
            .map_err(|e| PipelineError::Session(format!("invalid protection header: {e}")))?;
        self.session
            .build_license_challenge(&pssh, drm_widevine::LicenseType::Streaming)
            .map_err(|e| PipelineError::Session(format!("challenge build failed: {e}")))
    }

    fn parse_license(&mut self, response: &[u8]) -> Result<Vec<LicenseKey>, PipelineError> {
        let keys = self
            .session
            .parse_license_response(response)
            .map_err(|e| PipelineError::Session(format!("license parse failed: {e}")))?;

        Ok(keys
            .iter()
            .map(|key| LicenseKey {
                kid: key.kid_hex(),
                key: key.key_hex(),
                kind: if key.key_type() == drm_widevine::core::KeyType::Content {
                    LicenseKeyKind::Content
                } else {
                    LicenseKeyKind::Other
                },
            })
            .collect())
    }
}
