use std::sync::Arc;

use dotenvy::dotenv;
use garmin_core::{Config, HttpConnector, JsonResponse, Service};
use lambda_http::http::{header::HeaderValue, response::Builder, Method};
use lambda_http::{run, service_fn, tracing};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use serde_json::json;

fn with_cors(builder: Builder) -> Builder {
    builder
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", "GET, OPTIONS")
        .header("access-control-allow-headers", "Content-Type")
}

fn json_response(status: u16, body: &serde_json::Value) -> Result<Response<Body>, Error> {
    let body = serde_json::to_string(body)?;

    Ok(with_cors(Response::builder())
        .status(status)
        .header("content-type", "application/json")
        .body(body.into())?)
}

async fn function_handler(service: &Service, event: Request) -> Result<Response<Body>, Error> {
    match event.method() {
        &Method::GET => {}
        &Method::OPTIONS => {
            return Ok(with_cors(Response::builder()).status(204).body(Body::Empty)?);
        }
        other => {
            tracing::warn!("->> {} {} not allowed", other, event.uri().path());
            let body = json!({
                "error": "Method not allowed",
                "method": other.as_str(),
            });
            let mut res = json_response(405, &body)?;
            res.headers_mut().insert("allow", HeaderValue::from_static("GET, OPTIONS"));
            return Ok(res);
        }
    }

    let params = event.query_string_parameters();
    let date = params.first("date");
    let target = event
        .uri()
        .path_and_query()
        .map_or(event.uri().path(), |pq| pq.as_str());

    let JsonResponse { status, body } = service.dispatch(target, date).await;
    json_response(status, &body)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    let connector = HttpConnector::new(&config)?;
    let service = Service::new(config, Arc::new(connector));

    run(service_fn(|event: Request| function_handler(&service, event))).await
}
