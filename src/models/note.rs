use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::notes;

use super::{ModelValidationError, ValidationResult};
use crate::models::user::User;

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = notes)]
#[diesel(belongs_to(User))]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notes)]
pub struct NewNote {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

impl NewNote {
    pub fn validate(&mut self) -> ValidationResult<()> {
        if self.user_id == Uuid::nil() {
            return Err(ModelValidationError::InvalidUserId);
        }

        self.title = self.title.trim().to_string();
        ensure_valid_title(&self.title)?;

        self.body = self.body.trim().to_string();
        ensure_valid_body(&self.body)?;
        Ok(())
    }
}

fn ensure_valid_title(value: &str) -> ValidationResult<()> {
    let len = value.chars().count();
    if len == 0 || len > 120 {
        return Err(ModelValidationError::InvalidNoteTitle);
    }

    if value.chars().any(char::is_control) {
        return Err(ModelValidationError::InvalidNoteTitle);
    }

    Ok(())
}

fn ensure_valid_body(value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        Err(ModelValidationError::InvalidNoteBody)
    } else {
        Ok(())
    }
}
