use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{Connector, MetricSource};
use crate::config::{Credentials, MetricErrorMode};
use crate::error::{AuthError, FetchError};

/// The fixed set of daily metrics pulled for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sleep,
    Stress,
    BodyBattery,
    HeartRate,
    RestingHeartRate,
    Steps,
    Stats,
    Respiration,
    Hydration,
    TrainingStatus,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::Sleep,
        Metric::Stress,
        Metric::BodyBattery,
        Metric::HeartRate,
        Metric::RestingHeartRate,
        Metric::Steps,
        Metric::Stats,
        Metric::Respiration,
        Metric::Hydration,
        Metric::TrainingStatus,
    ];

    /// Key under which the metric appears in the report.
    pub fn key(self) -> &'static str {
        match self {
            Metric::Sleep => "sleep_data",
            Metric::Stress => "stress_data",
            Metric::BodyBattery => "body_battery",
            Metric::HeartRate => "heart_rate",
            Metric::RestingHeartRate => "resting_hr",
            Metric::Steps => "steps_data",
            Metric::Stats => "stats_data",
            Metric::Respiration => "respiration",
            Metric::Hydration => "hydration",
            Metric::TrainingStatus => "training_status",
        }
    }

    /// Garmin Connect path (with query) serving this metric.
    pub fn path(self, display_name: &str, date: &str) -> String {
        match self {
            Metric::Sleep => format!(
                "/wellness-service/wellness/dailySleepData/{display_name}?date={date}&nonSleepBufferMinutes=60"
            ),
            Metric::Stress => format!("/wellness-service/wellness/dailyStress/{date}"),
            Metric::BodyBattery => format!(
                "/wellness-service/wellness/bodyBattery/reports/daily?startDate={date}&endDate={date}"
            ),
            Metric::HeartRate => {
                format!("/wellness-service/wellness/dailyHeartRate/{display_name}?date={date}")
            }
            Metric::RestingHeartRate => format!(
                "/userstats-service/wellness/daily/{display_name}?fromDate={date}&untilDate={date}&metricId=60"
            ),
            Metric::Steps => {
                format!("/wellness-service/wellness/dailySummaryChart/{display_name}?date={date}")
            }
            Metric::Stats => format!(
                "/usersummary-service/usersummary/daily/{display_name}?calendarDate={date}"
            ),
            Metric::Respiration => format!("/wellness-service/wellness/daily/respiration/{date}"),
            Metric::Hydration => format!("/usersummary-service/usersummary/hydration/daily/{date}"),
            Metric::TrainingStatus => {
                format!("/metrics-service/metrics/trainingstatus/aggregated/{date}")
            }
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct MetricsReport {
    pub date: String,
    pub status: &'static str,
    pub timestamp: String,
    pub username: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<&'static str, Value>,
}

/// Falsy payloads carry no data and are reported as `null`.
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Folds one metric call into a report value. Never fails.
pub fn safe_call(result: Result<Value, FetchError>, mode: MetricErrorMode) -> Value {
    match result {
        Ok(value) if is_empty_payload(&value) => Value::Null,
        Ok(value) => value,
        Err(e) => match mode {
            MetricErrorMode::Report => json!({ "error": e.to_string() }),
            MetricErrorMode::Suppress => Value::Null,
        },
    }
}

/// Calls every metric in turn. One failing call never stops the rest.
pub async fn collect_metrics(
    source: &dyn MetricSource,
    date: &str,
    mode: MetricErrorMode,
) -> BTreeMap<&'static str, Value> {
    let mut metrics = BTreeMap::new();

    for metric in Metric::ALL {
        let result = source.fetch(metric, date).await;
        if let Err(e) = &result {
            warn!(metric = metric.key(), %date, "metric call failed: {e}");
        }
        metrics.insert(metric.key(), safe_call(result, mode));
    }

    metrics
}

/// Login with a bounded retry. Only transient failures are retried.
pub async fn login_with_retry(
    connector: &dyn Connector,
    credentials: &Credentials,
    attempts: u32,
    delay: Duration,
) -> Result<Box<dyn MetricSource>, AuthError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match connector.login(credentials).await {
            Ok(session) => {
                info!(method = credentials.method(), attempt, "logged in to Garmin Connect");
                return Ok(session);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(attempt, attempts, "login failed, retrying: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt, "login failed: {e}");
                return Err(e);
            }
        }
    }
}

pub struct FetchOptions {
    pub login_attempts: u32,
    pub login_retry_delay: Duration,
    pub metric_errors: MetricErrorMode,
}

/// Authenticates and builds the full report for `date`.
pub async fn fetch_metrics(
    connector: &dyn Connector,
    credentials: &Credentials,
    date: &str,
    options: &FetchOptions,
) -> Result<MetricsReport, AuthError> {
    let session = login_with_retry(
        connector,
        credentials,
        options.login_attempts,
        options.login_retry_delay,
    )
    .await?;

    let metrics = collect_metrics(session.as_ref(), date, options.metric_errors).await;

    Ok(MetricsReport {
        date: date.to_string(),
        status: "success",
        timestamp: Utc::now().to_rfc3339(),
        username: session.display_name().to_string(),
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = Metric::ALL.iter().map(|m| m.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Metric::ALL.len());
    }

    #[test]
    fn paths_carry_date_and_display_name() {
        assert_eq!(
            Metric::HeartRate.path("runner", "2024-09-28"),
            "/wellness-service/wellness/dailyHeartRate/runner?date=2024-09-28"
        );
        assert_eq!(
            Metric::BodyBattery.path("runner", "2024-09-28"),
            "/wellness-service/wellness/bodyBattery/reports/daily?startDate=2024-09-28&endDate=2024-09-28"
        );
    }

    #[test]
    fn safe_call_modes() {
        let err = || Err(FetchError::Status { status: 500, body: "boom".into() });
        assert_eq!(
            safe_call(err(), MetricErrorMode::Report),
            json!({ "error": "upstream returned 500: boom" })
        );
        assert_eq!(safe_call(err(), MetricErrorMode::Suppress), Value::Null);
        assert_eq!(safe_call(Ok(json!({ "steps": 10 })), MetricErrorMode::Report), json!({ "steps": 10 }));
    }

    #[test]
    fn falsy_payloads_become_null() {
        for empty in [json!({}), json!([]), json!(""), json!(0), json!(false), Value::Null] {
            assert_eq!(safe_call(Ok(empty), MetricErrorMode::Report), Value::Null);
        }
        assert_eq!(safe_call(Ok(json!(42)), MetricErrorMode::Report), json!(42));
    }
}
