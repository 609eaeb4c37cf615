use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::users;

use super::{ModelValidationError, ValidationResult};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_staff: bool,
}

impl NewUser {
    /// A freshly created account is active but carries no admin or staff
    /// privileges; those are granted later through the change form.
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        Self {
            email,
            name,
            password_hash,
            is_active: true,
            is_admin: false,
            is_staff: false,
        }
    }

    pub fn validate(&mut self) -> ValidationResult<()> {
        self.email = normalize_email(&self.email);
        ensure_valid_email(&self.email)?;

        self.name = self.name.trim().to_string();
        ensure_valid_display_name(&self.name)?;

        if self.password_hash.is_empty() {
            tracing::error!("Password hash is empty during validation");
            return Err(ModelValidationError::WeakPassword);
        }
        Ok(())
    }
}

/// Emails are compared case-insensitively; the stored form is lowercase.
pub(crate) fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn ensure_valid_email(value: &str) -> ValidationResult<()> {
    if !(3..=255).contains(&value.len()) {
        tracing::debug!(length = value.len(), "Email validation failed: invalid length");
        return Err(ModelValidationError::InvalidEmail);
    }

    let Some((local, domain)) = value.split_once('@') else {
        tracing::debug!("Email validation failed: missing @");
        return Err(ModelValidationError::InvalidEmail);
    };

    if local.is_empty() || domain.contains('@') {
        tracing::debug!("Email validation failed: empty local part or multiple @ symbols");
        return Err(ModelValidationError::InvalidEmail);
    }

    if domain.len() < 3 || !domain.contains('.') {
        tracing::debug!(
            domain_length = domain.len(),
            "Email validation failed: invalid domain part"
        );
        return Err(ModelValidationError::InvalidEmail);
    }

    let graphic = |c: char| c.is_ascii_graphic();
    if !local.chars().all(graphic) || !domain.chars().all(graphic) {
        tracing::debug!("Email validation failed: contains invalid characters");
        return Err(ModelValidationError::InvalidEmail);
    }

    Ok(())
}

pub(crate) fn ensure_valid_display_name(value: &str) -> ValidationResult<()> {
    let len = value.chars().count();
    if !(1..=80).contains(&len) {
        tracing::debug!(length = len, "Display name validation failed: invalid length");
        return Err(ModelValidationError::InvalidDisplayName);
    }

    if value.chars().any(char::is_control) {
        tracing::debug!("Display name validation failed: contains control characters");
        return Err(ModelValidationError::InvalidDisplayName);
    }

    Ok(())
}

pub(crate) fn ensure_valid_password(password: &str) -> ValidationResult<()> {
    if password.len() < 12 {
        tracing::debug!(
            length = password.len(),
            "Password validation failed: too short (minimum 12 characters)"
        );
        return Err(ModelValidationError::WeakPassword);
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if has_upper && has_lower && has_digit && has_symbol {
        Ok(())
    } else {
        tracing::debug!(
            has_uppercase = has_upper,
            has_lowercase = has_lower,
            has_digit = has_digit,
            has_symbol = has_symbol,
            "Password validation failed: missing required character types"
        );
        Err(ModelValidationError::WeakPassword)
    }
}
