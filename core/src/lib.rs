//! Daily Garmin Connect metrics behind a small JSON API.
//!
//! [`routes::Service`] is shared by the axum server and the lambda: it
//! classifies the path, resolves credentials from the environment, logs in
//! through a [`client::Connector`] and collects every [`metrics::Metric`]
//! for the requested date.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod tokens;

pub use client::{Connector, HttpConnector, MetricSource};
pub use config::{Config, CredentialSource, Credentials, MetricErrorMode};
pub use error::{AuthError, ConfigError, FetchError, RequestError};
pub use metrics::{fetch_metrics, Metric, MetricsReport};
pub use routes::{JsonResponse, Route, Service};
