use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sortli_core::config::{
    ApiKeys, AppConfig, DEFAULT_IMAGES_DIR, DEFAULT_RULES_PATH, DEFAULT_SECRETS_PATH,
};

/// Snap a photo of your waste and get bin-by-bin recycling advice.
#[derive(Debug, Parser)]
#[command(name = "sortli", version, about)]
pub(crate) struct Cli {
    /// Recycling rules document (JSON).
    #[arg(long, env = "SORTLI_RULES", default_value = DEFAULT_RULES_PATH)]
    pub rules: PathBuf,

    /// Directory holding the bin icons.
    #[arg(long, env = "SORTLI_IMAGES", default_value = DEFAULT_IMAGES_DIR)]
    pub images: PathBuf,

    /// TOML file with an `[api_keys]` table.
    #[arg(long, env = "SORTLI_SECRETS", default_value = DEFAULT_SECRETS_PATH)]
    pub secrets: PathBuf,

    /// OpenAI key, overrides the secrets file.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Groq key, overrides the secrets file.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    /// Location used when searching for nearby recycling sites.
    #[arg(long, env = "SORTLI_LOCATION")]
    pub location: Option<String>,

    /// Timeout for every request to the hosted services, in seconds.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Where logs are written; the terminal is reserved for the UI.
    #[arg(long, default_value = "sortli.log")]
    pub log_file: PathBuf,

    /// Override the image classifier model.
    #[arg(long)]
    pub classifier_model: Option<String>,

    /// Override the advice generator model.
    #[arg(long)]
    pub generator_model: Option<String>,

    /// Image to pre-fill the capture prompt with.
    pub image: Option<PathBuf>,
}

impl Cli {
    pub(crate) fn app_config(&self) -> AppConfig {
        let mut config = AppConfig {
            rules_path: self.rules.clone(),
            images_dir: self.images.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..AppConfig::default()
        };
        if let Some(location) = &self.location {
            config.site_finder.location.clone_from(location);
        }
        if let Some(model) = &self.classifier_model {
            config.classifier.model.clone_from(model);
        }
        if let Some(model) = &self.generator_model {
            config.generator.model.clone_from(model);
        }
        config
    }

    pub(crate) fn api_key_overrides(&self) -> ApiKeys {
        ApiKeys {
            openai: self.openai_api_key.clone(),
            groq: self.groq_api_key.clone(),
        }
    }
}
