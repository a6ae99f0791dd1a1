//! Runtime configuration and API credentials.

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use toml::de::Error as TomlError;
use tracing::debug;

/// Default location of the rules document.
pub const DEFAULT_RULES_PATH: &str = "data.json";
/// Default directory holding the bin icons.
pub const DEFAULT_IMAGES_DIR: &str = "images";
/// Default location of the credentials file.
pub const DEFAULT_SECRETS_PATH: &str = "secrets.toml";
/// Default upper bound for any outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
/// Configuration problems detected at startup.
pub enum ConfigError {
    /// A required API key is absent or blank.
    #[error("Please set your {service} API key")]
    MissingApiKey {
        /// Service the key belongs to.
        service: &'static str,
    },
    /// The secrets file exists but could not be read.
    #[error("Failed to read secrets file {}: {source}", path.display())]
    Read {
        /// File location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },
    /// The secrets file is not valid TOML.
    #[error("Malformed secrets file {}: {source}", path.display())]
    Parse {
        /// File location.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: TomlError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
/// API keys for the hosted services.
pub struct ApiKeys {
    /// Key for the image classifier service.
    #[serde(default)]
    pub openai: Option<String>,
    /// Key for the advice generator service.
    #[serde(default)]
    pub groq: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    api_keys: ApiKeys,
}

impl ApiKeys {
    /// Read the `[api_keys]` table from a TOML secrets file. A missing file yields
    /// empty keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the file exists but
    /// cannot be used.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No secrets file, relying on environment");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let secrets: SecretsFile = toml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            source: err,
        })?;
        Ok(secrets.api_keys)
    }

    /// Prefer keys from `overrides` where they are set.
    #[must_use]
    pub fn merge(self, overrides: ApiKeys) -> Self {
        Self {
            openai: overrides.openai.or(self.openai),
            groq: overrides.groq.or(self.groq),
        }
    }

    /// Key for the image classifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when it is absent or blank.
    pub fn require_openai(&self) -> Result<&str, ConfigError> {
        require(self.openai.as_deref(), "OpenAI")
    }

    /// Key for the advice generator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when it is absent or blank.
    pub fn require_groq(&self) -> Result<&str, ConfigError> {
        require(self.groq.as_deref(), "Groq")
    }
}

fn require<'key>(key: Option<&'key str>, service: &'static str) -> Result<&'key str, ConfigError> {
    key.map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingApiKey { service })
}

#[derive(Debug, Clone)]
/// Settings for the image classifier service.
pub struct ClassifierSettings {
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Vision-capable model.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            max_tokens: 300,
        }
    }
}

#[derive(Debug, Clone)]
/// Settings for the advice generator service.
pub struct GeneratorSettings {
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Chat model.
    pub model: String,
    /// Sampling temperature; zero keeps answers reproducible.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_owned(),
            model: "llama-3.1-70b-versatile".to_owned(),
            temperature: 0.0,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone)]
/// Settings for the nearby-sites lookup.
pub struct SiteFinderSettings {
    /// Location the query is made for.
    pub location: String,
}

impl Default for SiteFinderSettings {
    fn default() -> Self {
        Self {
            location: "Milan, Italy".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
/// Everything sortli needs to start a session.
pub struct AppConfig {
    /// Rules document location.
    pub rules_path: PathBuf,
    /// Directory holding the bin icons.
    pub images_dir: PathBuf,
    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
    /// Image classifier settings.
    pub classifier: ClassifierSettings,
    /// Advice generator settings.
    pub generator: GeneratorSettings,
    /// Site finder settings.
    pub site_finder: SiteFinderSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            classifier: ClassifierSettings::default(),
            generator: GeneratorSettings::default(),
            site_finder: SiteFinderSettings::default(),
        }
    }
}
