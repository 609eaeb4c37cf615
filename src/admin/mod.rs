use axum::{
    Extension, Json, Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{Value, json};

use crate::db::PgPool;
use crate::errors::AppError;
use crate::schema::users::dsl::{is_active, is_admin, users as users_table};
use crate::security::auth::{AuthenticatedUser, authenticate};

pub mod registry;
pub mod users;

pub use registry::{AdminRegistry, FieldSet, ModelAdmin, bootstrap, registry};

pub fn router() -> Router {
    Router::new()
        .route("/admin/config", get(admin_config))
        .route(
            "/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/admin/users/:id",
            get(users::user_detail).put(users::update_user),
        )
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn(authenticate))
}

/// The declarative configuration the admin front end renders from.
async fn admin_config() -> Json<Value> {
    let models: Vec<&ModelAdmin> = registry().entries().collect();
    Json(json!({ "models": models }))
}

/// Gate for every admin route: the bearer identity must resolve to an
/// active admin account.
async fn require_admin(
    Extension(pool): Extension<PgPool>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .ok_or(AppError::MissingIdentity)?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let (admin_flag, active_flag): (bool, bool) = users_table
        .find(identity.0)
        .select((is_admin, is_active))
        .first(&mut conn)
        .await
        .map_err(|err| match err {
            diesel::result::Error::NotFound => AppError::InvalidToken,
            other => AppError::Database(other),
        })?;

    if !active_flag || !admin_flag {
        tracing::debug!(user_id = %identity.0, "Admin access denied");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}
