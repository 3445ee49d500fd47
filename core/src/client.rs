use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, Credentials};
use crate::error::{AuthError, FetchError};
use crate::metrics::Metric;
use crate::tokens::TokenPair;

const USER_AGENT: &str = "GCM-iOS-5.7.2.1";
const PROFILE_PATH: &str = "/userprofile-service/userprofile";
const MAX_ERROR_BODY: usize = 200;

/// An authenticated session able to answer per-metric calls.
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn display_name(&self) -> &str;

    fn full_name(&self) -> &str;

    async fn fetch(&self, metric: Metric, date: &str) -> Result<Value, FetchError>;
}

/// Turns credentials into a session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Box<dyn MetricSource>, AuthError>;
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    user_name: Option<String>,
    full_name: Option<String>,
}

/// Connector talking to Garmin Connect over HTTPS with injected tokens.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    base_url: Option<Arc<String>>,
    display_name: Option<Arc<String>>,
    full_name: Option<Arc<String>>,
}

impl HttpConnector {
    pub fn new_w_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.api_base_url.clone().map(Arc::new),
            display_name: config.display_name.clone().map(Arc::new),
            full_name: config.full_name.clone().map(Arc::new),
        }
    }

    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::new_w_client(client, config))
    }

    fn base_url_for(&self, tokens: &TokenPair) -> String {
        match &self.base_url {
            Some(url) => url.to_string(),
            None => format!("https://connectapi.{}", tokens.oauth1.domain),
        }
    }

    async fn login_with_tokens(&self, tokens: &TokenPair) -> Result<HttpSession, AuthError> {
        let now = Utc::now().timestamp();
        if tokens.oauth2.is_expired(now) {
            return Err(AuthError::TokenExpired(tokens.oauth2.expires_at.unwrap_or(now)));
        }

        let mut session = HttpSession {
            client: self.client.clone(),
            base_url: self.base_url_for(tokens),
            access_token: tokens.oauth2.access_token.clone(),
            display_name: "unknown".to_string(),
            full_name: "User".to_string(),
        };

        if let Some(name) = &self.display_name {
            session.display_name = name.to_string();
            if let Some(full) = &self.full_name {
                session.full_name = full.to_string();
            }
            return Ok(session);
        }

        match session.get(PROFILE_PATH).await {
            Ok(value) => {
                let profile: UserProfile = serde_json::from_value(value).unwrap_or(UserProfile {
                    user_name: None,
                    full_name: None,
                });
                if let Some(user_name) = profile.user_name {
                    session.display_name = user_name;
                }
                if let Some(full_name) = profile.full_name {
                    session.full_name = full_name;
                }
            }
            Err(FetchError::Unauthorized(status)) => {
                return Err(AuthError::Rejected(format!("profile lookup returned {status}")));
            }
            Err(FetchError::Transport(e)) => return Err(AuthError::Transport(e)),
            Err(FetchError::RateLimited(_)) => return Err(AuthError::Upstream(429)),
            Err(FetchError::Status { status, .. }) if status >= 500 => {
                return Err(AuthError::Upstream(status));
            }
            Err(e) => {
                warn!("profile lookup failed, continuing without display name: {e}");
            }
        }

        if let Some(full) = &self.full_name {
            session.full_name = full.to_string();
        }

        Ok(session)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn login(&self, credentials: &Credentials) -> Result<Box<dyn MetricSource>, AuthError> {
        match credentials {
            Credentials::Tokens(tokens) => {
                let session = self.login_with_tokens(tokens).await?;
                Ok(Box::new(session))
            }
            Credentials::Password { .. } => Err(AuthError::PasswordLoginUnsupported),
        }
    }
}

#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    display_name: String,
    full_name: String,
}

impl HttpSession {
    async fn get(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status.as_u16()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let msg = res.text().await.unwrap_or_default();
            let msg = if msg.is_empty() { "Rate limit exceeded".to_string() } else { truncate(msg) };
            return Err(FetchError::RateLimited(msg));
        }

        if !status.is_success() {
            let body = truncate(res.text().await.unwrap_or_default());
            return Err(FetchError::Status { status: status.as_u16(), body });
        }

        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl MetricSource for HttpSession {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    async fn fetch(&self, metric: Metric, date: &str) -> Result<Value, FetchError> {
        self.get(&metric.path(&self.display_name, date)).await
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
