use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use tracing::info;

use crate::client::Connector;
use crate::config::{Config, Credentials};
use crate::error::RequestError;
use crate::metrics::{fetch_metrics, login_with_retry, FetchOptions};

pub const AVAILABLE_ROUTES: [&str; 4] = ["/test", "/test_auth", "/garmin?date=YYYY-MM-DD", "/garmin/YYYY-MM-DD"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Test,
    TestAuth,
    Garmin,
    NotFound,
}

impl Route {
    /// Substring match on the raw request target, query included. `test_auth`
    /// is checked before `test`.
    pub fn classify(target: &str) -> Route {
        let path = target.split_once('?').map_or(target, |(path, _)| path);

        if target.contains("test_auth") {
            Route::TestAuth
        } else if target.contains("test") {
            Route::Test
        } else if target.contains("garmin") {
            Route::Garmin
        } else if path.is_empty() || path == "/" {
            Route::Home
        } else {
            Route::NotFound
        }
    }
}

/// Status code plus JSON body, independent of the hosting runtime.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Value,
}

impl JsonResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

impl From<RequestError> for JsonResponse {
    fn from(err: RequestError) -> Self {
        Self { status: err.status_code(), body: err.to_body() }
    }
}

/// Picks the requested date: `date` query parameter, then a segment after
/// `/garmin/`, then today. Rejects malformed and future dates.
pub fn resolve_date(path: &str, date_param: Option<&str>, today: NaiveDate) -> Result<String, RequestError> {
    let from_path = path
        .split_once("/garmin/")
        .map(|(_, rest)| rest.trim_matches('/'))
        .filter(|rest| !rest.is_empty());

    let raw = match date_param.map(str::trim).filter(|d| !d.is_empty()).or(from_path) {
        Some(raw) => raw,
        None => return Ok(today.format("%Y-%m-%d").to_string()),
    };

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .filter(|_| raw.len() == 10)
        .ok_or_else(|| RequestError::InvalidDate(raw.to_string()))?;

    if date > today {
        return Err(RequestError::FutureDate(raw.to_string()));
    }

    Ok(raw.to_string())
}

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct Service {
    pub config: Arc<Config>,
    pub connector: Arc<dyn Connector>,
}

impl Service {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self { config: Arc::new(config), connector }
    }

    fn options(&self) -> FetchOptions {
        FetchOptions {
            login_attempts: self.config.login_attempts,
            login_retry_delay: self.config.login_retry_delay,
            metric_errors: self.config.metric_errors,
        }
    }

    fn credentials(&self, date: Option<&str>) -> Result<Credentials, RequestError> {
        self.config
            .credentials
            .resolve()?
            .ok_or_else(|| RequestError::MissingCredentials { date: date.map(str::to_string) })
    }

    /// Routes one GET request. `target` is the raw path plus query string.
    /// Errors are already rendered into the response.
    pub async fn dispatch(&self, target: &str, date_param: Option<&str>) -> JsonResponse {
        let route = Route::classify(target);
        let path = target.split_once('?').map_or(target, |(path, _)| path);
        info!(?route, %target, "handling request");

        let result = match route {
            Route::Home => Ok(JsonResponse::ok(json!({
                "status": "Garmin API working",
                "message": "Garmin API ready",
                "endpoints": AVAILABLE_ROUTES,
            }))),
            Route::Test => Ok(JsonResponse::ok(json!({
                "status": "API Garmin working",
                "message": "Test route OK",
                "endpoints": AVAILABLE_ROUTES,
                "path_received": target,
            }))),
            Route::TestAuth => self.test_auth().await,
            Route::Garmin => self.garmin(path, date_param).await,
            Route::NotFound => Err(RequestError::NotFound { path: target.to_string() }),
        };

        result.unwrap_or_else(JsonResponse::from)
    }

    async fn test_auth(&self) -> Result<JsonResponse, RequestError> {
        let credentials = self.credentials(None)?;
        let options = self.options();

        let session = login_with_retry(
            self.connector.as_ref(),
            &credentials,
            options.login_attempts,
            options.login_retry_delay,
        )
        .await
        .map_err(|source| RequestError::Auth { date: None, source })?;

        Ok(JsonResponse::ok(json!({
            "status": "authenticated",
            "username": session.display_name(),
            "full_name": session.full_name(),
            "method": credentials.method(),
        })))
    }

    async fn garmin(&self, path: &str, date_param: Option<&str>) -> Result<JsonResponse, RequestError> {
        let date = resolve_date(path, date_param, Local::now().date_naive())?;
        let credentials = self.credentials(Some(date.as_str()))?;

        let report = fetch_metrics(self.connector.as_ref(), &credentials, &date, &self.options())
            .await
            .map_err(|source| RequestError::Auth { date: Some(date.clone()), source })?;

        let body = serde_json::to_value(&report)
            .unwrap_or_else(|e| json!({ "date": date, "status": "error", "error": e.to_string() }));

        Ok(JsonResponse::ok(body))
    }
}
