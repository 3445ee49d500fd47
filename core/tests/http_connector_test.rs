use garmin_core::{
    AuthError, Config, Connector, Credentials, FetchError, HttpConnector, Metric, MetricSource,
};
use garmin_core::metrics::login_with_retry;
use garmin_core::tokens::TokenPair;
use std::time::Duration;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tokens() -> Credentials {
    let pair = TokenPair::parse(
        r#"{"oauth_token":"t","oauth_token_secret":"s"}"#,
        r#"{"access_token":"secret-access","expires_at":4102444800}"#,
    )
    .unwrap();
    Credentials::Tokens(pair)
}

fn connector_for(server: &MockServer, display_name: Option<&str>) -> HttpConnector {
    let config = Config {
        api_base_url: Some(server.uri()),
        display_name: display_name.map(str::to_string),
        ..Default::default()
    };
    HttpConnector::new(&config).unwrap()
}

#[tokio::test]
async fn login_resolves_profile_and_sends_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userprofile-service/userprofile"))
        .and(header("authorization", "Bearer secret-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userName": "runner42",
            "fullName": "Jo Runner",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wellness-service/wellness/dailyHeartRate/runner42"))
        .and(query_param("date", "2024-09-28"))
        .and(header("authorization", "Bearer secret-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "restingHeartRate": 48 })))
        .mount(&server)
        .await;

    let session = connector_for(&server, None).login(&tokens()).await.ok().unwrap();
    assert_eq!(session.display_name(), "runner42");
    assert_eq!(session.full_name(), "Jo Runner");

    let value = session.fetch(Metric::HeartRate, "2024-09-28").await.unwrap();
    assert_eq!(value["restingHeartRate"], 48);
}

#[tokio::test]
async fn configured_display_name_skips_profile_lookup() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let session = connector_for(&server, Some("fixed")).login(&tokens()).await.ok().unwrap();
    assert_eq!(session.display_name(), "fixed");
}

#[tokio::test]
async fn missing_profile_falls_back_to_unknown() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = connector_for(&server, None).login(&tokens()).await.ok().unwrap();
    assert_eq!(session.display_name(), "unknown");
    assert_eq!(session.full_name(), "User");
}

#[tokio::test]
async fn profile_server_error_fails_login_as_retryable() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = connector_for(&server, None).login(&tokens()).await.err().unwrap();
    assert!(matches!(err, AuthError::Upstream(503)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn profile_rate_limit_fails_login_as_retryable() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = connector_for(&server, None).login(&tokens()).await.err().unwrap();
    assert!(matches!(err, AuthError::Upstream(429)));
}

#[tokio::test]
async fn profile_server_error_is_retried_until_it_clears() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userName": "runner42" })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = connector_for(&server, None);
    let session = login_with_retry(&connector, &tokens(), 3, Duration::ZERO).await.ok().unwrap();
    assert_eq!(session.display_name(), "runner42");
}

#[tokio::test]
async fn rejected_token_fails_login() {
    let server = MockServer::start().await;
    Mock::given(path("/userprofile-service/userprofile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = connector_for(&server, None).login(&tokens()).await.err().unwrap();
    assert!(matches!(err, AuthError::Rejected(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn status_mapping() {
    let server = MockServer::start().await;
    Mock::given(path("/wellness-service/wellness/dailyStress/2024-09-28"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(path("/wellness-service/wellness/daily/respiration/2024-09-28"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(path("/usersummary-service/usersummary/hydration/daily/2024-09-28"))
        .respond_with(ResponseTemplate::new(500).set_body_string("kaput"))
        .mount(&server)
        .await;
    Mock::given(path("/metrics-service/metrics/trainingstatus/aggregated/2024-09-28"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let session = connector_for(&server, Some("runner")).login(&tokens()).await.ok().unwrap();

    assert!(session.fetch(Metric::Stress, "2024-09-28").await.unwrap().is_null());
    assert!(matches!(
        session.fetch(Metric::Respiration, "2024-09-28").await,
        Err(FetchError::RateLimited(_))
    ));
    match session.fetch(Metric::Hydration, "2024-09-28").await {
        Err(FetchError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "kaput");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        session.fetch(Metric::TrainingStatus, "2024-09-28").await,
        Err(FetchError::Unauthorized(403))
    ));
}
