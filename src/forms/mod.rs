pub mod user;

use thiserror::Error;

pub use user::{UserChangeForm, UserCreationForm};

/// Field-level form failure. Validation stops at the first offending field so
/// no partial record is ever persisted.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },

    #[error("password2: passwords don't match")]
    PasswordMismatch,

    #[error("failed to hash password: {0}")]
    Hashing(String),
}

impl FormError {
    pub fn field(field: &'static str, message: impl ToString) -> Self {
        FormError::Field {
            field,
            message: message.to_string(),
        }
    }

    /// The offending field, when the failure is attributable to one.
    pub fn field_name(&self) -> Option<&'static str> {
        match self {
            FormError::Field { field, .. } => Some(field),
            FormError::PasswordMismatch => Some("password2"),
            FormError::Hashing(_) => None,
        }
    }
}
