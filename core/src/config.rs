use serde::Deserialize;
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::{debug, error};

pub const MODEL_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const GEOCODING_API_KEY_ENV_VAR: &str = "OPENCAGE_API_KEY";
pub const WEATHER_API_KEY_ENV_VAR: &str = "OPENWEATHER_API_KEY";

const MODEL_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEOCODING_URL: &str = "https://api.opencagedata.com/geocode/v1/json";
const WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEOCODING_LANGUAGE: &str = "ko";
const DEFAULT_WEATHER_LANGUAGE: &str = "kr";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing credential: env var `{0}` is not set")]
    MissingCredential(String),
    #[error("Invalid config overrides: {0}")]
    InvalidOverrides(#[from] serde_json::Error),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// An API key that never shows up in `Debug` output
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: ApiKey,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

/// Settings shared by the geocoding and weather lookups
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: ApiKey,
    pub api_url: String,
    pub language: String,
    pub timeout: Duration,
}

/// Everything a run needs, resolved once at startup and handed to each collaborator.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub geocoding: ServiceConfig,
    pub weather: ServiceConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct Overrides {
    model: Option<ModelOverrides>,
    geocoding: Option<ServiceOverrides>,
    weather: Option<ServiceOverrides>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelOverrides {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ServiceOverrides {
    api_key_var: Option<String>,
    api_url: Option<String>,
    language: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Resolves the config from the process environment with default endpoints.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolves the config using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(Overrides::default(), lookup)
    }

    /// Resolves the config with a json document overriding the defaults.
    ///
    /// ```json
    /// {
    ///   "model": { "model": "gemini-2.5-pro", "temperature": 0.2 },
    ///   "geocoding": { "api_key_var": "MY_OPENCAGE_KEY", "language": "en" },
    ///   "weather": { "timeout_secs": 10 }
    /// }
    /// ```
    ///
    /// Unknown fields are rejected.
    pub fn with_overrides<F>(json: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: Overrides = serde_json::from_str(json).map_err(|e| {
            error!(error = %e, "Failed to deserialize config overrides");
            ConfigError::from(e)
        })?;
        Self::resolve(overrides, lookup)
    }

    fn resolve<F>(overrides: Overrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = overrides.model.unwrap_or_default();
        let geocoding = overrides.geocoding.unwrap_or_default();
        let weather = overrides.weather.unwrap_or_default();

        let model_key = fetch_key(&lookup, model.api_key_var.as_deref(), MODEL_API_KEY_ENV_VAR)?;
        let geocoding_key = fetch_key(
            &lookup,
            geocoding.api_key_var.as_deref(),
            GEOCODING_API_KEY_ENV_VAR,
        )?;
        let weather_key = fetch_key(
            &lookup,
            weather.api_key_var.as_deref(),
            WEATHER_API_KEY_ENV_VAR,
        )?;
        debug!("All credentials present");

        Ok(Self {
            model: ModelConfig {
                api_key: model_key,
                api_url: model.api_url.unwrap_or_else(|| MODEL_URL.to_string()),
                model: model.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: timeout(model.timeout_secs),
                temperature: model.temperature,
                max_output_tokens: model.max_output_tokens,
            },
            geocoding: ServiceConfig {
                api_key: geocoding_key,
                api_url: geocoding
                    .api_url
                    .unwrap_or_else(|| GEOCODING_URL.to_string()),
                language: geocoding
                    .language
                    .unwrap_or_else(|| DEFAULT_GEOCODING_LANGUAGE.to_string()),
                timeout: timeout(geocoding.timeout_secs),
            },
            weather: ServiceConfig {
                api_key: weather_key,
                api_url: weather.api_url.unwrap_or_else(|| WEATHER_URL.to_string()),
                language: weather
                    .language
                    .unwrap_or_else(|| DEFAULT_WEATHER_LANGUAGE.to_string()),
                timeout: timeout(weather.timeout_secs),
            },
        })
    }
}

fn fetch_key<F>(lookup: &F, var: Option<&str>, default_var: &str) -> Result<ApiKey, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = var.unwrap_or(default_var);
    match lookup(var) {
        Some(key) if !key.trim().is_empty() => Ok(ApiKey(key)),
        _ => {
            error!(var, "Missing credential");
            Err(ConfigError::MissingCredential(var.to_string()))
        }
    }
}

fn timeout(secs: Option<u64>) -> Duration {
    Duration::from_secs(secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
}

/// Builds the HTTP client a collaborator owns, bounded by its request timeout.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
