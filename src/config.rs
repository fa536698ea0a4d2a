use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::classifier::content_safety::DEFAULT_API_VERSION;

/// Default classifier timeout in seconds.
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 30;

/// Default request body limit for uploads (Content Safety accepts up to 4 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure Content Safety resource endpoint, e.g. https://<name>.cognitiveservices.azure.com
    pub content_safety_endpoint: String,
    pub content_safety_key: String,
    pub content_safety_api_version: String,
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    /// Upper bound on a single classifier call
    pub classifier_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Classifier credentials may be empty here: the server still starts and
    /// each moderation call reports the missing configuration.
    pub fn load() -> Result<Self> {
        let classifier_timeout_secs = match env::var("IMGMOD_CLASSIFIER_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("IMGMOD_CLASSIFIER_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => DEFAULT_CLASSIFIER_TIMEOUT_SECS,
        };
        if classifier_timeout_secs == 0 {
            anyhow::bail!("IMGMOD_CLASSIFIER_TIMEOUT_SECS must be at least 1");
        }

        let max_upload_bytes = match env::var("IMGMOD_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("IMGMOD_MAX_UPLOAD_BYTES is not a number: {raw}"))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            content_safety_endpoint: env::var("CONTENT_SAFETY_ENDPOINT").unwrap_or_default(),
            content_safety_key: env::var("CONTENT_SAFETY_KEY").unwrap_or_default(),
            content_safety_api_version: env::var("CONTENT_SAFETY_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            db_path: env::var("IMGMOD_DB_PATH").unwrap_or_else(|_| "./imgmod.db".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            classifier_timeout: Duration::from_secs(classifier_timeout_secs),
            max_upload_bytes,
        })
    }

    /// Whether both Content Safety settings are present.
    pub fn classifier_configured(&self) -> bool {
        !self.content_safety_endpoint.is_empty() && !self.content_safety_key.is_empty()
    }

    /// Check that the Content Safety credentials are configured.
    pub fn require_classifier(&self) -> Result<()> {
        if !self.classifier_configured() {
            anyhow::bail!(
                "CONTENT_SAFETY_ENDPOINT and CONTENT_SAFETY_KEY must both be set.\n\
                 Add them to your .env file. See .env.example for details."
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_safety_endpoint: String::new(),
            content_safety_key: String::new(),
            content_safety_api_version: DEFAULT_API_VERSION.to_string(),
            db_path: "./imgmod.db".to_string(),
            database_url: None,
            classifier_timeout: Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
