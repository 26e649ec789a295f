use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use data_encoding::BASE64;

use crate::pipeline::error::PipelineError;

/// Browser user agent the provider's endpoints expect.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

/// Deadline applied to every pipeline network call. Timeouts are reported,
/// never retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/**
    Provider endpoint constants. Fixed in normal use; overridable through the
    environment so tests can point the pipeline at a local stub.
*/
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base of the unauthenticated listing endpoints.
    pub shows_base: String,
    /// Base of the HMAC-protected media metadata endpoints.
    pub media_base: String,
    /// Application name segment of the media metadata path.
    pub app_name: String,
    /// `platform` query parameter on listing requests.
    pub platform: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            shows_base: "https://corona.channel5.com/shows".into(),
            media_base: "https://cassie.channel5.com/api/v2/media".into(),
            app_name: "my5desktopng".into(),
            platform: "my5desktop".into(),
        }
    }
}

impl ProviderConfig {
    /// Provider constants with environment overrides, for commands that need
    /// no secrets (catalog crawling).
    pub fn from_env() -> Self {
        let file_vars = load_env_file();
        provider_from_lookup(&|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.get(name).cloned())
        })
    }
}

fn provider_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> ProviderConfig {
    let mut provider = ProviderConfig::default();
    if let Some(v) = lookup("SHOWS_BASE_URL") {
        provider.shows_base = v;
    }
    if let Some(v) = lookup("MEDIA_BASE_URL") {
        provider.media_base = v;
    }
    if let Some(v) = lookup("APP_NAME") {
        provider.app_name = v;
    }
    provider
}

/**
    Process-wide configuration, read once at startup and never mutated.

    Each pipeline component receives only the specific value it needs (the
    signed-request builder gets the HMAC secret, the envelope decryptor the
    AES key), never the whole bag.
*/
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    /// Decoded HMAC-SHA256 secret for signing media metadata URLs.
    pub hmac_secret: Vec<u8>,
    /// Decoded AES-128 key for the metadata envelope.
    pub aes_key: [u8; 16],
    /// Path to the provisioned CDM device credential.
    pub device_path: PathBuf,
    pub download_dir: PathBuf,
    pub tmp_dir: PathBuf,
    /// Optional directory holding the external engine binaries.
    pub bin_dir: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Config {
    /**
        Read configuration from the process environment, falling back to the
        first env file found (`~/.config/vidgrab/env`, then `./.env`).

        Fails fast: a missing or undecodable secret, or a device credential
        path that does not exist, is an error here, before any network work.
    */
    pub fn from_env() -> Result<Self, PipelineError> {
        let file_vars = load_env_file();
        Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_vars.get(name).cloned())
        })
    }

    /// Build from an arbitrary variable source. Split out so tests can inject
    /// values without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let hmac_secret = decode_secret("HMAC_SECRET", &lookup)?;
        let aes = decode_secret("AES_KEY", &lookup)?;
        let aes_key: [u8; 16] = aes.as_slice().try_into().map_err(|_| {
            PipelineError::Config(format!(
                "AES_KEY must decode to 16 bytes, got {}",
                aes.len()
            ))
        })?;

        let device_path = PathBuf::from(required("WVD_PATH", &lookup)?);
        if !device_path.is_file() {
            return Err(PipelineError::Config(format!(
                "device credential '{}' does not exist",
                device_path.display()
            )));
        }

        Ok(Self {
            provider: provider_from_lookup(&lookup),
            hmac_secret,
            aes_key,
            device_path,
            download_dir: lookup("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            tmp_dir: lookup("TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./tmp")),
            bin_dir: lookup("BIN_DIR").map(PathBuf::from),
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    /// Resolve an external engine binary, preferring `bin_dir` when set.
    pub fn engine(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

fn required(name: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String, PipelineError> {
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::Config(format!("{name} is not set")))
}

fn decode_secret(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Vec<u8>, PipelineError> {
    let value = required(name, lookup)?;
    BASE64
        .decode(value.as_bytes())
        .map_err(|e| PipelineError::Config(format!("{name} is not valid base64: {e}")))
}

/// Find and parse the first env file. Missing files are fine; the
/// environment itself may carry everything.
fn load_env_file() -> HashMap<String, String> {
    for path in env_file_candidates() {
        if path.is_file()
            && let Ok(text) = std::fs::read_to_string(&path)
        {
            return parse_env_file(&text);
        }
    }
    HashMap::new()
}

fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("vidgrab").join("env"));
    }
    candidates.push(PathBuf::from(".env"));
    candidates
}

/// `KEY = "value"` lines; `#` comments and blank lines skipped; quotes
/// around the value optional.
fn parse_env_file(text: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.trim().to_string(), value.to_string());
        }
    }
    vars
}
