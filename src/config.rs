use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::DocstringerError;

/// Environment variable that can point at a config file
pub const CONFIG_ENV: &str = "DOCSTRINGER_CONFIG";

/// Config file looked up in the current directory when nothing else is given
pub const DEFAULT_CONFIG_FILE: &str = "docstringer.toml";

/// Main configuration structure
///
/// Every section is optional; a run with no config file uses the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Text generation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout; the overall run has none
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Replaces the built-in prompt template when set
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,
}

/// Token pricing used for estimates and actual cost accounting
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_price_per_1k_tokens")]
    pub price_per_1k_tokens: f64,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Inflates dry-run estimates to account for the (unknown) response length
    #[serde(default = "default_cost_multiplier")]
    pub cost_multiplier: f64,
}

/// Run-level tuning
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> usize {
    2
}

fn default_price_per_1k_tokens() -> f64 {
    0.002
}

fn default_chars_per_token() -> usize {
    4
}

fn default_cost_multiplier() -> f64 {
    1.5
}

fn default_concurrency() -> usize {
    4
}

fn default_max_file_size() -> u64 {
    1024 * 1024 // 1MB
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            prompt_file: None,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_per_1k_tokens: default_price_per_1k_tokens(),
            chars_per_token: default_chars_per_token(),
            cost_multiplier: default_cost_multiplier(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for a config file in this order:
    /// 1. `explicit` (from `--config`), which must exist
    /// 2. Path in the DOCSTRINGER_CONFIG environment variable, which must exist
    /// 3. ./docstringer.toml, optional
    ///
    /// With no file found the built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let required = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let config = match required {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.generation.base_url).with_context(|| {
            format!("generation.base_url is not a valid URL: {}", self.generation.base_url)
        })?;

        if self.generation.model.trim().is_empty() {
            anyhow::bail!("generation.model must not be empty");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be greater than 0");
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }

        if self.pricing.chars_per_token == 0 {
            anyhow::bail!("pricing.chars_per_token must be greater than 0");
        }

        if self.pricing.price_per_1k_tokens < 0.0 || self.pricing.cost_multiplier < 0.0 {
            anyhow::bail!("pricing values must not be negative");
        }

        if self.run.concurrency == 0 {
            anyhow::bail!("run.concurrency must be greater than 0");
        }

        Ok(())
    }

    /// Read the generation credential from the configured environment variable.
    ///
    /// Only required outside dry-run mode.
    pub fn api_key(&self) -> crate::error::Result<String> {
        match std::env::var(&self.generation.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(DocstringerError::Config(format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable, or use --dryrun.",
                self.generation.api_key_env
            ))),
        }
    }

    /// Worker pool size, clamped to a sane range
    pub fn concurrency(&self) -> usize {
        self.run.concurrency.clamp(1, 16)
    }
}
