use axum::Router;

pub mod auth;
pub mod home;
pub mod notes;

pub fn create_router() -> Router {
    tracing::debug!("Creating application router");
    Router::new()
        .merge(home::router())
        .merge(auth::router())
        .merge(notes::router())
        .merge(crate::admin::router())
}
