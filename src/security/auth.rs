use std::{collections::HashSet, sync::OnceLock};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// The identity a valid bearer token resolves to. Extractable on any route
/// behind the `authenticate` middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

/// Identity for routes that serve both authenticated and anonymous callers.
/// A missing Authorization header is anonymous; a present-but-invalid token
/// is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct OptionalIdentity(pub Option<Uuid>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

static JWT_SECRET: OnceLock<String> = OnceLock::new();

pub async fn authenticate(mut request: Request, next: Next) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.ok_or(AppError::MissingAuthHeader)?;
    let claims = decode_token(token)?;

    {
        let extensions = request.extensions_mut();
        extensions.insert(AuthenticatedUser(claims.sub));
        extensions.insert(claims);
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(header_value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header_str = header_value
        .to_str()
        .map_err(|_| AppError::InvalidAuthHeader)?;

    header_str
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or(AppError::InvalidAuthHeader)
}

pub fn issue_token(user_id: Uuid) -> Result<String, AppError> {
    let secret = jwt_secret()?;
    let now = Utc::now();
    let expires_at = now + ChronoDuration::hours(24);

    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
        .map_err(|err| AppError::TokenEncoding(err.to_string()))
}

pub fn decode_token(token: &str) -> Result<Claims, AppError> {
    let secret = jwt_secret()?;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

fn jwt_secret() -> Result<&'static String, AppError> {
    JWT_SECRET.get().map(Ok).unwrap_or_else(|| {
        let value = std::env::var("JWT_SECRET").map_err(|_| AppError::MissingJwtSecret)?;
        ensure_secret_strength(&value)?;
        Ok(JWT_SECRET.get_or_init(|| value))
    })
}

fn ensure_secret_strength(secret: &str) -> Result<(), AppError> {
    let trimmed = secret.trim();
    if trimmed.len() < 32 {
        return Err(AppError::WeakJwtSecret);
    }

    let unique_chars = trimmed.chars().collect::<HashSet<_>>();
    if unique_chars.len() < 8 {
        return Err(AppError::WeakJwtSecret);
    }

    Ok(())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(AppError::MissingIdentity)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers)? {
            None => Ok(OptionalIdentity(None)),
            Some(token) => {
                let claims = decode_token(token)?;
                Ok(OptionalIdentity(Some(claims.sub)))
            }
        }
    }
}
