mod config;
mod doc;
mod dtos;
mod error;
mod routes;
mod scheduler;
mod state;
mod utils;

use crate::{config::ServerConfig, doc::ApiDoc, routes::health, state::AppState};
use database::db::create_connection;
use log::info;
use migration::{Migrator, MigratorTrait};
use std::error::Error;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;
use utils::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = ServerConfig::from_env()?;
    let db = create_connection(&config.database_url).await?;

    if config.run_migrations {
        Migrator::up(&db, None).await?;
        info!("Database migrations applied");
    }

    let sweeper = scheduler::spawn(db.clone(), config.reconcile_interval);

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(utoipa_axum::routes!(health::health))
        .merge(routes::batch::router())
        .merge(routes::enrollment::router())
        .split_for_parts();

    let app = router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api))
        .layer(ServiceBuilder::new().layer(CompressionLayer::new()))
        .with_state(AppState { db });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Running axum on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}
