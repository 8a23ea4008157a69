use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown provider: {0}. Available providers: fal, openai")]
    UnknownProvider(String),
    #[error("API key must be provided via --api-key or {0}")]
    MissingApiKey(&'static str),
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Fal,
    OpenAI,
}

impl ProviderKind {
    fn prefix(&self) -> &'static str {
        match self {
            ProviderKind::Fal => "FAL",
            ProviderKind::OpenAI => "OPENAI",
        }
    }

    fn key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Fal => &["FAL_KEY", "FAL_API_KEY"],
            ProviderKind::OpenAI => &["OPENAI_API_KEY"],
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fal" => Ok(ProviderKind::Fal),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Fal => f.write_str("fal"),
            ProviderKind::OpenAI => f.write_str("openai"),
        }
    }
}

/// Connection settings for one inference provider, read once at startup.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub api_url: Url,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

// Keeps the key out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("api_url", &self.api_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_env(kind: ProviderKind, api_key: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(kind, api_key, |var| env::var(var).ok())
    }

    pub fn from_lookup<F>(kind: ProviderKind, api_key: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = kind.prefix();

        let api_key = api_key
            .or_else(|| kind.key_vars().iter().find_map(|var| lookup(var)))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey(kind.key_vars()[0]))?;

        let model = lookup(&format!("{}_MODEL", prefix))
            .or_else(|| lookup(&format!("{}_VISION_MODEL", prefix)))
            .unwrap_or_else(|| match kind {
                ProviderKind::Fal => "fal-ai/mini-cpm".to_string(),
                ProviderKind::OpenAI => "gpt-4o-mini".to_string(),
            });

        let url_var = match kind {
            ProviderKind::Fal => "FAL_QUEUE_URL".to_string(),
            ProviderKind::OpenAI => "OPENAI_API_URL".to_string(),
        };
        let raw_url = lookup(&url_var).unwrap_or_else(|| match kind {
            ProviderKind::Fal => "https://queue.fal.run".to_string(),
            ProviderKind::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
        });
        let api_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidUrl {
            var: url_var,
            source,
        })?;

        let poll_interval = Duration::from_millis(parse_number(
            &lookup,
            &format!("{}_POLL_INTERVAL_MS", prefix),
            500,
        )?);
        let request_timeout = Duration::from_secs(parse_number(&lookup, "MEAL_REQUEST_TIMEOUT_SECS", 120)?);

        Ok(Self {
            kind,
            api_key,
            model,
            api_url,
            poll_interval,
            request_timeout,
        })
    }
}

fn parse_number<F>(lookup: &F, var: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
