use thiserror::Error;

/**
    Errors from the episode-resolution pipeline.

    Only `Config` is fatal to the process; every other variant is scoped to a
    single episode and reported at the batch boundary without aborting the
    remaining episodes. Nothing here is retried automatically: these failures
    come from configuration drift or provider schema drift, where a blind
    retry cannot help.
*/
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required configuration is missing or malformed. Checked before any
    /// network work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// The episode reference does not match a supported path shape.
    #[error("unsupported episode reference '{0}'")]
    UnsupportedLocator(String),

    /// The episode exists but has no on-demand stream.
    #[error("episode is not available on demand")]
    NotAvailable,

    /// An HTTP request failed outright (connect, timeout, ...).
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// An HTTP request completed with a non-success status.
    #[error("'{url}' returned HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// The encrypted metadata envelope could not be decrypted.
    #[error("envelope decryption failed: {0}")]
    Decrypt(String),

    /// A response decoded fine but did not match the expected schema.
    #[error("unexpected response shape: {0}")]
    Parse(String),

    /// The manifest carries no Widevine-protected asset.
    #[error("no Widevine-protected asset in manifest")]
    NoProtectedAsset,

    /// The media manifest did not repeat the protection header.
    #[error("expected a repeated protection header in the media manifest, found {0} occurrence(s)")]
    HeaderNotFound(usize),

    /// Opening the CDM session or building the challenge failed.
    #[error("CDM session error: {0}")]
    Session(String),

    /// The license server rejected the challenge.
    #[error("license server returned HTTP {status}")]
    LicenseServer { status: u16 },

    /// The license parsed but contained no CONTENT-typed key.
    #[error("license response contained no content key")]
    NoContentKey,
}

impl PipelineError {
    /**
        Operator-actionable hint for failures that usually mean the shared
        provider credentials have rotated, as opposed to a transient fault.
    */
    pub fn operator_hint(&self) -> Option<&'static str> {
        match self {
            PipelineError::Fetch { status: 403, .. }
            | PipelineError::LicenseServer { status: 403 } => {
                Some("HTTP 403 usually means the provider rotated its keys; regenerate HMAC_SECRET and AES_KEY")
            }
            PipelineError::Decrypt(_) => {
                Some("decryption failures usually mean AES_KEY no longer matches the provider; regenerate it")
            }
            _ => None,
        }
    }

    /// `true` for the one pre-flight error class that should stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}
