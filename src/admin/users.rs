use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::db::PgPool;
use crate::errors::AppError;
use crate::forms::{UserChangeForm, UserCreationForm};
use crate::logging::{LoggableUuid, SanitizedEmail, SecurityEvent};
use crate::models::user::User;
use crate::schema::users;
use crate::security::json::ValidatedJson;

use super::registry::{ModelAdmin, registry};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    q: Option<String>,
    is_admin: Option<bool>,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    columns: &'static [&'static str],
    rows: Vec<Value>,
    count: usize,
}

/// List view: rows projected through `list_display`, narrowed by the
/// configured filters and search fields, ordered per the config.
#[tracing::instrument(name = "admin_list_users", skip(pool, params))]
pub async fn list_users(
    Extension(pool): Extension<PgPool>,
    Query(params): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let cfg = registry().get("users").ok_or(AppError::NotFound)?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let mut query = users::table.into_boxed();

    if cfg.list_filter.contains(&"is_admin") {
        if let Some(flag) = params.is_admin {
            query = query.filter(users::is_admin.eq(flag));
        }
    }
    if cfg.list_filter.contains(&"name") {
        if let Some(name) = params.name {
            query = query.filter(users::name.eq(name));
        }
    }

    if let Some(term) = params.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term);
        let by_email = cfg.search_fields.contains(&"email");
        let by_name = cfg.search_fields.contains(&"name");
        query = match (by_email, by_name) {
            (true, true) => query.filter(
                users::email
                    .ilike(pattern.clone())
                    .or(users::name.ilike(pattern)),
            ),
            (true, false) => query.filter(users::email.ilike(pattern)),
            (false, true) => query.filter(users::name.ilike(pattern)),
            (false, false) => query,
        };
    }

    query = match cfg.ordering.first().copied() {
        Some("name") => query.order(users::name.asc()),
        _ => query.order(users::email.asc()),
    };

    let records: Vec<User> = query
        .load(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    let rows: Vec<Value> = records
        .iter()
        .map(|user| project_row(user, cfg.list_display))
        .collect();

    Ok(Json(UserListResponse {
        columns: cfg.list_display,
        count: rows.len(),
        rows,
    }))
}

/// Detail view: the user's fields grouped by the configured fieldsets.
#[tracing::instrument(name = "admin_user_detail", skip(pool))]
pub async fn user_detail(
    Extension(pool): Extension<PgPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let cfg = registry().get("users").ok_or(AppError::NotFound)?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .await
        .map_err(AppError::from_diesel)?;

    Ok(Json(render_detail(&user, cfg)))
}

/// Add view: the reduced creation-form field set.
#[tracing::instrument(name = "admin_create_user", skip(pool, form))]
pub async fn create_user(
    Extension(pool): Extension<PgPool>,
    ValidatedJson(form): ValidatedJson<UserCreationForm>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = form.save(&pool).await?;

    crate::log_security_event!(
        SecurityEvent::AdminUserCreated,
        user_id = %LoggableUuid(user.id),
        email = %SanitizedEmail::new(&user.email),
        "User created via admin surface"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// Change view: email, name, and flags. The change form cannot touch the
/// stored password.
#[tracing::instrument(name = "admin_update_user", skip(pool, form))]
pub async fn update_user(
    Extension(pool): Extension<PgPool>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(form): ValidatedJson<UserChangeForm>,
) -> Result<Json<User>, AppError> {
    let user = form.save(&pool, user_id).await?;

    crate::log_security_event!(
        SecurityEvent::AdminUserUpdated,
        user_id = %LoggableUuid(user.id),
        email = %SanitizedEmail::new(&user.email),
        "User updated via admin surface"
    );

    Ok(Json(user))
}

fn field_value(user: &User, field: &str) -> Value {
    match field {
        "email" => json!(user.email),
        "name" => json!(user.name),
        "password" => json!(user.password_hash),
        "is_active" => json!(user.is_active),
        "is_admin" => json!(user.is_admin),
        "is_staff" => json!(user.is_staff),
        _ => Value::Null,
    }
}

fn project_row(user: &User, columns: &[&str]) -> Value {
    let mut row = serde_json::Map::new();
    // Row identity for the edit link; not a display column.
    row.insert("id".to_string(), json!(user.id));
    for column in columns {
        row.insert((*column).to_string(), field_value(user, column));
    }
    Value::Object(row)
}

fn render_detail(user: &User, cfg: &ModelAdmin) -> Value {
    let fieldsets: Vec<Value> = cfg
        .fieldsets
        .iter()
        .map(|fieldset| {
            json!({
                "title": fieldset.title,
                "classes": fieldset.classes,
                "fields": fieldset
                    .fields
                    .iter()
                    .map(|field| {
                        json!({
                            "name": field,
                            "value": field_value(user, field),
                            "readonly": *field == "password",
                        })
                    })
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "model": cfg.model,
        "id": user.id,
        "fieldsets": fieldsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            is_active: true,
            is_admin: true,
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_projection_follows_list_display() {
        let user = sample_user();
        let row = project_row(&user, &["email", "name", "is_admin"]);

        assert_eq!(row["email"], "ada@example.com");
        assert_eq!(row["name"], "Ada");
        assert_eq!(row["is_admin"], true);
        assert!(row.get("password").is_none());
        assert!(row.get("is_staff").is_none());
    }

    #[test]
    fn detail_marks_password_read_only_and_shows_stored_hash() {
        let user = sample_user();
        let cfg = registry().get("users").expect("users registered");
        let detail = render_detail(&user, cfg);

        let credentials = &detail["fieldsets"][0]["fields"];
        let password_field = credentials
            .as_array()
            .unwrap()
            .iter()
            .find(|field| field["name"] == "password")
            .expect("password field present");

        assert_eq!(password_field["readonly"], true);
        assert_eq!(password_field["value"], user.password_hash.as_str());

        let email_field = &credentials[0];
        assert_eq!(email_field["name"], "email");
        assert_eq!(email_field["readonly"], false);
    }

    #[test]
    fn detail_groups_follow_the_configured_fieldsets() {
        let user = sample_user();
        let cfg = registry().get("users").expect("users registered");
        let detail = render_detail(&user, cfg);

        let fieldsets = detail["fieldsets"].as_array().unwrap();
        assert_eq!(fieldsets.len(), 3);
        assert_eq!(fieldsets[1]["title"], "Personal info");
        assert_eq!(fieldsets[2]["title"], "Permissions");
    }
}
