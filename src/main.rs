use std::sync::Arc;

use dotenvy::dotenv;
use garmin_core::{Config, HttpConnector, Service};
use garmin_daily::{app, init_tracing, GenericError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), GenericError> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let connector = HttpConnector::new(&config)?;
    let addr = config.listen_addr();

    if config.credentials.resolve()?.is_none() {
        tracing::warn!("no Garmin credentials configured, /garmin will answer 400");
    }

    let router = app(Service::new(config, Arc::new(connector)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    Ok(())
}
