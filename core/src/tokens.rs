use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_domain() -> String {
    "garmin.com".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default = "OAuth2Token::default_token_type")]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token_expires_at: Option<i64>,
}

impl OAuth2Token {
    fn default_token_type() -> String {
        "Bearer".to_string()
    }

    /// True once `expires_at` (unix seconds) has passed. Tokens without an
    /// expiry are assumed live.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Token pair injected into the client instead of a password login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub oauth1: OAuth1Token,
    pub oauth2: OAuth2Token,
}

impl TokenPair {
    pub fn parse(oauth1: &str, oauth2: &str) -> Result<Self, ConfigError> {
        let oauth1 = serde_json::from_str(oauth1).map_err(|source| ConfigError::InvalidToken {
            name: "GARMIN_OAUTH1_TOKEN",
            source,
        })?;
        let oauth2 = serde_json::from_str(oauth2).map_err(|source| ConfigError::InvalidToken {
            name: "GARMIN_OAUTH2_TOKEN",
            source,
        })?;

        Ok(Self { oauth1, oauth2 })
    }
}
