mod admin;
mod db;
mod errors;
mod forms;
mod logging;
mod models;
mod routes;
mod schema;
mod security;

use std::net::SocketAddr;

use anyhow::Context;
use axum::{Extension, Router, extract::DefaultBodyLimit, middleware, serve};
use db::establish_pool;
use dotenvy::dotenv;
use routes::create_router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    // One-time process-wide admin configuration; request handlers read the
    // resulting registry immutably.
    admin::bootstrap();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set before startup")?;
    let pool = establish_pool(&database_url).await?;

    let router: Router = create_router()
        .layer(middleware::from_fn(security::headers::set_security_headers))
        .layer(DefaultBodyLimit::max(security::json::MAX_BODY_SIZE_BYTES))
        .layer(Extension(pool.clone()));

    let app = router.into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()
        .context("BIND_ADDR must be a valid socket address")?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "graphite listening");

    serve(listener, app).await?;

    Ok(())
}
