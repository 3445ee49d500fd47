use serde_json::json;

/// Problems reading the environment or the credential blobs.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{name} is not a valid token blob: {source}")]
    InvalidToken {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("password login is not supported by this connector, provide GARMIN_OAUTH1_TOKEN and GARMIN_OAUTH2_TOKEN instead")]
    PasswordLoginUnsupported,
    #[error("oauth2 token expired at {0}")]
    TokenExpired(i64),
    #[error("credentials rejected: {0}")]
    Rejected(String),
    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("login failed with status {0}")]
    Upstream(u16),
}

impl AuthError {
    /// Whether another login attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Transport(_) => true,
            AuthError::Upstream(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure of a single metric call. Captured, never fatal.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("unauthorized ({0})")]
    Unauthorized(u16),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors that end a request before a report can be built.
#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("Garmin credentials not configured")]
    MissingCredentials { date: Option<String> },
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date {0} is in the future")]
    FutureDate(String),
    #[error("Route not found")]
    NotFound { path: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Garmin connection failed: {source}")]
    Auth {
        date: Option<String>,
        #[source]
        source: AuthError,
    },
}

impl RequestError {
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::MissingCredentials { .. }
            | RequestError::InvalidDate(_)
            | RequestError::FutureDate(_) => 400,
            RequestError::NotFound { .. } => 404,
            RequestError::Config(_) | RequestError::Auth { .. } => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            RequestError::MissingCredentials { .. } => "MissingCredentials",
            RequestError::InvalidDate(_) => "InvalidDate",
            RequestError::FutureDate(_) => "FutureDate",
            RequestError::NotFound { .. } => "NotFound",
            RequestError::Config(_) => "ConfigError",
            RequestError::Auth { .. } => "AuthError",
        }
    }

    /// JSON body sent to the caller.
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.to_string(),
            "error_type": self.error_type(),
        });

        match self {
            RequestError::MissingCredentials { date } => {
                body["date"] = json!(date);
                body["help"] = json!(
                    "Configure GARMIN_OAUTH1_TOKEN and GARMIN_OAUTH2_TOKEN, or GARMIN_EMAIL and GARMIN_PASSWORD"
                );
            }
            RequestError::Auth { date, .. } => body["date"] = json!(date),
            RequestError::NotFound { path } => {
                body["path"] = json!(path);
                body["available_routes"] = json!(crate::routes::AVAILABLE_ROUTES);
            }
            _ => {}
        }

        body
    }
}
