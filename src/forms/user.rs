use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::PgPool;
use crate::errors::AppError;
use crate::models::ModelValidationError;
use crate::models::user::{
    NewUser, User, ensure_valid_display_name, ensure_valid_email, ensure_valid_password,
    normalize_email,
};
use crate::schema::users;

use super::FormError;

/// Data-entry form for creating a user account. Requires the password twice;
/// the plaintext is hashed during `build` and discarded.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCreationForm {
    pub email: String,
    pub name: String,
    pub password1: String,
    pub password2: String,
}

impl UserCreationForm {
    pub fn validate(&mut self) -> Result<(), FormError> {
        self.email = normalize_email(&self.email);
        ensure_valid_email(&self.email).map_err(|err| FormError::field("email", err))?;

        self.name = self.name.trim().to_string();
        ensure_valid_display_name(&self.name).map_err(|err| FormError::field("name", err))?;

        if self.password1.is_empty() {
            return Err(FormError::field("password1", "password is required"));
        }
        if self.password2.is_empty() {
            return Err(FormError::field("password2", "password confirmation is required"));
        }
        if self.password1 != self.password2 {
            return Err(FormError::PasswordMismatch);
        }

        ensure_valid_password(&self.password1).map_err(|err| FormError::field("password1", err))?;

        Ok(())
    }

    /// Validates and produces an unsaved `NewUser` (the commit-less half of
    /// `save`), with the password already hashed. Argon2 hashing runs on the
    /// blocking pool.
    pub async fn build(mut self) -> Result<NewUser, FormError> {
        self.validate()?;

        let password = std::mem::take(&mut self.password1);
        self.password2.clear();

        let password_hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|err| FormError::Hashing(err.to_string()))?
        .map_err(|err| FormError::Hashing(err.to_string()))?;

        let mut new_user = NewUser::new(self.email, self.name, password_hash);
        new_user.validate().map_err(|err| match err {
            ModelValidationError::InvalidEmail => FormError::field("email", err),
            ModelValidationError::InvalidDisplayName => FormError::field("name", err),
            other => FormError::field("password1", other),
        })?;

        Ok(new_user)
    }

    /// Validates, hashes, and persists. Returns the stored user record.
    pub async fn save(self, pool: &PgPool) -> Result<User, AppError> {
        let new_user = self.build().await?;

        let mut conn = pool
            .get()
            .await
            .map_err(|err| AppError::Pool(err.to_string()))?;

        let user = diesel::insert_into(users::table)
            .values(&new_user)
            .get_result(&mut conn)
            .await
            .map_err(AppError::from_diesel)?;

        Ok(user)
    }
}

/// Data-entry form for updating a user. The password is display-only here:
/// any submitted password input is discarded and the stored hash is what
/// renders. Password changes go through a dedicated flow, never this form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserChangeForm {
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_staff: bool,
    #[serde(default)]
    password: Option<String>,
}

impl UserChangeForm {
    pub fn validate(&mut self) -> Result<(), FormError> {
        self.email = normalize_email(&self.email);
        ensure_valid_email(&self.email).map_err(|err| FormError::field("email", err))?;

        self.name = self.name.trim().to_string();
        ensure_valid_display_name(&self.name).map_err(|err| FormError::field("name", err))?;

        Ok(())
    }

    /// What the read-only password field renders: always the stored hash,
    /// regardless of any input supplied to the form.
    pub fn display_password<'a>(&self, current_hash: &'a str) -> &'a str {
        current_hash
    }

    /// Persists email, name, and the permission flags. The column set
    /// deliberately excludes `password_hash`.
    pub async fn save(mut self, pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        self.validate()?;

        let mut conn = pool
            .get()
            .await
            .map_err(|err| AppError::Pool(err.to_string()))?;

        let user = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::email.eq(&self.email),
                users::name.eq(&self.name),
                users::is_active.eq(self.is_active),
                users::is_admin.eq(self.is_admin),
                users::is_staff.eq(self.is_staff),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)
            .await
            .map_err(AppError::from_diesel)?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};
    use serde_json::json;

    fn creation_form(password1: &str, password2: &str) -> UserCreationForm {
        UserCreationForm {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            password1: password1.to_string(),
            password2: password2.to_string(),
        }
    }

    #[test]
    fn mismatched_passwords_fail_validation() {
        let mut form = creation_form("Correct-horse-1!", "Wrong-horse-2!");
        let err = form.validate().expect_err("mismatch must fail");
        assert_eq!(err.field_name(), Some("password2"));
        assert!(matches!(err, FormError::PasswordMismatch));
    }

    #[test]
    fn missing_confirmation_fails_validation() {
        let mut form = creation_form("Correct-horse-1!", "");
        let err = form.validate().expect_err("empty confirmation must fail");
        assert_eq!(err.field_name(), Some("password2"));
    }

    #[test]
    fn matching_passwords_validate_and_normalize() {
        let mut form = creation_form("Correct-horse-1!", "Correct-horse-1!");
        form.email = "  Ada@Example.COM ".to_string();
        form.validate().expect("matching passwords must validate");
        assert_eq!(form.email, "ada@example.com");
    }

    #[test]
    fn weak_password_fails_even_when_confirmed() {
        let mut form = creation_form("short", "short");
        let err = form.validate().expect_err("weak password must fail");
        assert_eq!(err.field_name(), Some("password1"));
    }

    #[tokio::test]
    async fn build_stores_only_a_verifiable_hash() {
        let plaintext = "Correct-horse-1!";
        let form = creation_form(plaintext, plaintext);
        let new_user = form.build().await.expect("build must succeed");

        assert_ne!(new_user.password_hash, plaintext);
        assert!(new_user.is_active);
        assert!(!new_user.is_admin);

        let parsed = PasswordHash::new(&new_user.password_hash).expect("PHC string");
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .expect("hash must verify against the original plaintext");
    }

    #[test]
    fn change_form_discards_password_input() {
        let stored_hash = "$argon2id$v=19$m=19456,t=2,p=1$abcdef$0123456789";
        let mut form: UserChangeForm = serde_json::from_value(json!({
            "email": "ada@example.com",
            "name": "Ada",
            "is_active": true,
            "is_admin": false,
            "is_staff": false,
            "password": "attempted-plaintext-change"
        }))
        .expect("payload with password input still deserializes");

        form.validate().expect("form is valid");
        assert_eq!(form.display_password(stored_hash), stored_hash);
    }

    #[test]
    fn change_form_rejects_invalid_email() {
        let mut form: UserChangeForm = serde_json::from_value(json!({
            "email": "not-an-email",
            "name": "Ada",
            "is_active": true,
            "is_admin": true,
            "is_staff": true
        }))
        .expect("deserializes");

        let err = form.validate().expect_err("invalid email must fail");
        assert_eq!(err.field_name(), Some("email"));
    }
}
