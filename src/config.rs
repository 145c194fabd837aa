use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::{MatchingPolicy, ScoringWeights};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub delegate: DelegateSettings,
    pub session: SessionSettings,
    pub pool: PoolSettings,
    pub matching: MatchingSettings,
    pub scoring: ScoringSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            workers: None,
        }
    }
}

/// Remote ranking delegate (Anthropic Messages API)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelegateSettings {
    pub api_url: String,
    /// Remote ranking is unavailable without a key
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub anthropic_version: String,
    pub timeout_secs: u64,
}

impl Default for DelegateSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: None,
            model: "claude-haiku-4-5-20251001".to_string(),
            max_tokens: 2000,
            anthropic_version: "2023-06-01".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions stay in process memory when unset
    pub redis_url: Option<String>,
    pub ttl_secs: u64,
    pub l1_cache_size: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: 60 * 60 * 24 * 30,
            l1_cache_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub path: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            path: "data/therapists.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub result_limit: usize,
    pub cultural_floor: f64,
    pub tie_window: f64,
    pub repetition_penalty: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        let policy = MatchingPolicy::default();
        Self {
            result_limit: policy.result_limit,
            cultural_floor: policy.cultural_floor,
            tie_window: policy.tie_window,
            repetition_penalty: policy.repetition_penalty,
        }
    }
}

impl From<&MatchingSettings> for MatchingPolicy {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            result_limit: settings.result_limit,
            cultural_floor: settings.cultural_floor,
            tie_window: settings.tie_window,
            repetition_penalty: settings.repetition_penalty,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

/// Maximum points per factor
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_specialty_weight")]
    pub specialty: f64,
    #[serde(default = "default_specialty_per_concern")]
    pub specialty_per_concern: f64,
    #[serde(default = "default_approach_weight")]
    pub approach: f64,
    #[serde(default = "default_cultural_weight")]
    pub cultural: f64,
    #[serde(default = "default_language_weight")]
    pub language: f64,
    #[serde(default = "default_lgbtq_weight")]
    pub lgbtq: f64,
    #[serde(default = "default_style_weight")]
    pub style: f64,
    #[serde(default = "default_religious_weight")]
    pub religious: f64,
    #[serde(default = "default_insurance_weight")]
    pub insurance: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            specialty: default_specialty_weight(),
            specialty_per_concern: default_specialty_per_concern(),
            approach: default_approach_weight(),
            cultural: default_cultural_weight(),
            language: default_language_weight(),
            lgbtq: default_lgbtq_weight(),
            style: default_style_weight(),
            religious: default_religious_weight(),
            insurance: default_insurance_weight(),
        }
    }
}

fn default_specialty_weight() -> f64 { 25.0 }
fn default_specialty_per_concern() -> f64 { 8.0 }
fn default_approach_weight() -> f64 { 12.0 }
fn default_cultural_weight() -> f64 { 30.0 }
fn default_language_weight() -> f64 { 12.0 }
fn default_lgbtq_weight() -> f64 { 8.0 }
fn default_style_weight() -> f64 { 6.0 }
fn default_religious_weight() -> f64 { 4.0 }
fn default_insurance_weight() -> f64 { 3.0 }

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            specialty: config.specialty,
            specialty_per_concern: config.specialty_per_concern,
            approach: config.approach,
            cultural: config.cultural,
            language: config.language,
            lgbtq: config.lgbtq,
            style: config.style,
            religious: config.religious,
            insurance: config.insurance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with BETTERMATCH_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., BETTERMATCH__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("BETTERMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("BETTERMATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        ScoringWeights::from(&self.scoring.weights)
    }

    pub fn matching_policy(&self) -> MatchingPolicy {
        MatchingPolicy::from(&self.matching)
    }
}

/// Apply the plain environment variables the service has always honoured
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("CLAUDE_API_KEY") {
        if !api_key.trim().is_empty() {
            builder = builder.set_override("delegate.api_key", api_key)?;
        }
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("session.redis_url", redis_url)?;
    }
    if let Ok(port) = env::var("PORT") {
        let port: i64 = port
            .parse()
            .map_err(|_| ConfigError::Message(format!("PORT is not a number: {}", port)))?;
        builder = builder.set_override("server.port", port)?;
    }

    builder.build()
}
