use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use garmin_core::{JsonResponse, Service};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

pub type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every path goes through the substring router in `garmin_core`.
pub fn app(service: Service) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback_service(get(dispatch))
        .layer(cors)
        .layer(Extension(service))
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub struct ApiResponse(pub JsonResponse);

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !status.is_success() {
            tracing::warn!("->> {} {}", status, self.0.body["error"]);
        }

        (status, Json(self.0.body)).into_response()
    }
}

async fn dispatch(
    Extension(service): Extension<Service>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResponse {
    let date = params.get("date").map(String::as_str);
    let target = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    ApiResponse(service.dispatch(target, date).await)
}
