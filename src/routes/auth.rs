use std::{num::NonZeroU32, time::Duration};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    Extension, Json, Router, http::StatusCode, middleware, response::IntoResponse, routing::post,
};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::db::PgPool;
use crate::errors::AppError;
use crate::forms::UserCreationForm;
use crate::logging::{LoggableUuid, SanitizedEmail, SanitizedName, SecurityEvent};
use crate::models::user::{User, ensure_valid_email, normalize_email};
use crate::schema::users::dsl::{email as users_email, users};
use crate::security::auth::issue_token;
use crate::security::json::ValidatedJson;
use crate::security::rate_limit::{RateLimiterState, enforce_rate_limit};

pub fn router() -> Router {
    Router::new()
        .route(
            "/auth/register",
            post(register).layer(middleware::from_fn_with_state(
                RateLimiterState::new(
                    NonZeroU32::new(5).expect("burst must be non-zero"),
                    Duration::from_secs(5 * 60),
                ),
                enforce_rate_limit,
            )),
        )
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(
                RateLimiterState::new(
                    NonZeroU32::new(10).expect("burst must be non-zero"),
                    Duration::from_secs(60),
                ),
                enforce_rate_limit,
            )),
        )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    email: String,
    password: String,
}

impl LoginRequest {
    fn validate(&mut self) -> Result<(), String> {
        self.email = normalize_email(&self.email);
        ensure_valid_email(&self.email).map_err(|err| err.to_string())?;

        if self.password.trim().is_empty() {
            return Err("password must not be empty".to_string());
        }

        if self.password.chars().count() > 256 {
            return Err("password must not exceed 256 characters".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: User,
}

/// Public registration runs through the same creation form the admin add
/// view uses, so password-confirmation rules cannot drift between the two.
#[tracing::instrument(name = "register_user", skip(pool, form), fields(email, name, user_id))]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    ValidatedJson(form): ValidatedJson<UserCreationForm>,
) -> Result<impl IntoResponse, AppError> {
    let submitted_email = normalize_email(&form.email);

    tracing::Span::current().record(
        "email",
        tracing::field::display(SanitizedEmail::new(&submitted_email)),
    );
    tracing::Span::current().record(
        "name",
        tracing::field::display(SanitizedName::new(form.name.trim())),
    );

    tracing::debug!(
        email = %SanitizedEmail::new(&submitted_email),
        "Processing registration request"
    );

    let user = form.save(&pool).await.map_err(|err| {
        crate::log_security_event!(
            SecurityEvent::RegistrationFailure,
            email = %SanitizedEmail::new(&submitted_email),
            error = %err,
            "User registration failed"
        );

        err
    })?;

    tracing::Span::current().record("user_id", tracing::field::display(LoggableUuid(user.id)));

    let token = issue_token(user.id)?;

    crate::log_security_event!(
        SecurityEvent::RegistrationSuccess,
        user_id = %LoggableUuid(user.id),
        email = %SanitizedEmail::new(&user.email),
        "User registered successfully"
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[tracing::instrument(name = "login_user", skip(pool, payload), fields(email, user_id))]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    ValidatedJson(mut payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(AppError::Validation)?;

    let normalized_email = payload.email.clone();

    tracing::Span::current().record(
        "email",
        tracing::field::display(SanitizedEmail::new(&normalized_email)),
    );

    tracing::debug!(
        email = %SanitizedEmail::new(&normalized_email),
        "Processing login request"
    );

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let user: User = users
        .filter(users_email.eq(&normalized_email))
        .first(&mut conn)
        .await
        .map_err(|err| match err {
            DieselError::NotFound => {
                crate::log_security_event!(
                    SecurityEvent::LoginFailure,
                    email = %SanitizedEmail::new(&normalized_email),
                    reason = "user_not_found",
                    "Login failed: user not found"
                );
                AppError::InvalidCredentials
            }
            other => {
                tracing::error!(
                    email = %SanitizedEmail::new(&normalized_email),
                    error = %other,
                    "Database error during login"
                );
                AppError::Database(other)
            }
        })?;

    tracing::Span::current().record("user_id", tracing::field::display(LoggableUuid(user.id)));

    let password_hash = PasswordHash::new(&user.password_hash).map_err(|_| {
        crate::log_security_event!(
            SecurityEvent::LoginFailure,
            user_id = %LoggableUuid(user.id),
            email = %SanitizedEmail::new(&normalized_email),
            reason = "invalid_password_hash",
            "Login failed: invalid password hash"
        );
        AppError::InvalidCredentials
    })?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &password_hash)
        .map_err(|_| {
            crate::log_security_event!(
                SecurityEvent::LoginFailure,
                user_id = %LoggableUuid(user.id),
                email = %SanitizedEmail::new(&normalized_email),
                reason = "incorrect_password",
                "Login failed: incorrect password"
            );
            AppError::InvalidCredentials
        })?;

    // Deactivated accounts fail with the same uniform message as bad
    // credentials.
    if !user.is_active {
        crate::log_security_event!(
            SecurityEvent::LoginFailure,
            user_id = %LoggableUuid(user.id),
            email = %SanitizedEmail::new(&normalized_email),
            reason = "inactive_account",
            "Login failed: inactive account"
        );
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(user.id)?;

    crate::log_security_event!(
        SecurityEvent::LoginSuccess,
        user_id = %LoggableUuid(user.id),
        email = %SanitizedEmail::new(&normalized_email),
        "User logged in successfully"
    );

    Ok((StatusCode::OK, Json(AuthResponse { token, user })))
}
