//! Demo server: reads settings from the environment (and `.env`), connects to PostgreSQL and
//! mounts the common, discovery and table routes.

use dynamic_api::{api_routes, AppState, Settings};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dynamic_api=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let access = settings.access_config().await?;
    if access.valid_schemas.is_empty() {
        tracing::warn!("no valid schemas configured; every table request will be rejected");
    }
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    let app = api_routes(AppState::new(pool, access));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
