use std::time::Duration;

use crate::error::ConfigError;
use crate::tokens::TokenPair;

/// What a failed metric call turns into in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricErrorMode {
    /// `{"error": "..."}`
    Report,
    /// `null`
    Suppress,
}

/// Credential variables as found in the environment, unparsed.
#[derive(Debug, Clone, Default)]
pub struct CredentialSource {
    pub email: Option<String>,
    pub password: Option<String>,
    pub oauth1_token: Option<String>,
    pub oauth2_token: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Credentials {
    Password { email: String, password: String },
    Tokens(TokenPair),
}

impl Credentials {
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::Password { .. } => "password",
            Credentials::Tokens(_) => "tokens",
        }
    }
}

impl CredentialSource {
    /// Token blobs win over a password pair. `Ok(None)` means nothing usable
    /// is configured.
    pub fn resolve(&self) -> Result<Option<Credentials>, ConfigError> {
        if let (Some(oauth1), Some(oauth2)) = (&self.oauth1_token, &self.oauth2_token) {
            return TokenPair::parse(oauth1, oauth2).map(|pair| Some(Credentials::Tokens(pair)));
        }

        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok(Some(Credentials::Password {
                email: email.clone(),
                password: password.clone(),
            })),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: CredentialSource,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    /// Overrides the `https://connectapi.{domain}` default.
    pub api_base_url: Option<String>,
    pub login_attempts: u32,
    pub login_retry_delay: Duration,
    pub http_timeout: Duration,
    pub metric_errors: MetricErrorMode,
    pub bind_addr: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialSource::default(),
            display_name: None,
            full_name: None,
            api_base_url: None,
            login_attempts: 3,
            login_retry_delay: Duration::from_secs(2),
            http_timeout: Duration::from_secs(30),
            metric_errors: MetricErrorMode::Report,
            bind_addr: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let metric_errors = match var("GARMIN_METRIC_ERRORS").as_deref() {
            None | Some("report") => MetricErrorMode::Report,
            Some("suppress") | Some("null") => MetricErrorMode::Suppress,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "GARMIN_METRIC_ERRORS",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            credentials: CredentialSource {
                email: var("GARMIN_EMAIL"),
                password: var("GARMIN_PASSWORD"),
                oauth1_token: var("GARMIN_OAUTH1_TOKEN"),
                oauth2_token: var("GARMIN_OAUTH2_TOKEN"),
            },
            display_name: var("GARMIN_DISPLAY_NAME"),
            full_name: var("GARMIN_FULL_NAME"),
            api_base_url: var("GARMIN_API_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            login_attempts: parse_or(var("GARMIN_LOGIN_ATTEMPTS"), "GARMIN_LOGIN_ATTEMPTS", defaults.login_attempts)?
                .max(1),
            login_retry_delay: Duration::from_secs(parse_or(
                var("GARMIN_LOGIN_RETRY_DELAY_SECS"),
                "GARMIN_LOGIN_RETRY_DELAY_SECS",
                defaults.login_retry_delay.as_secs(),
            )?),
            http_timeout: Duration::from_secs(parse_or(
                var("GARMIN_HTTP_TIMEOUT_SECS"),
                "GARMIN_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            metric_errors,
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(var("PORT"), "PORT", defaults.port)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}
