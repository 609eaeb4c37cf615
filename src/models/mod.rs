pub mod note;
pub mod tag;
pub mod user;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelValidationError {
    #[error("email must contain a single '@' and a domain section")]
    InvalidEmail,
    #[error("display name must be between 1 and 80 visible characters")]
    InvalidDisplayName,
    #[error(
        "password must be at least 12 characters and include upper, lower, digit, and symbol characters"
    )]
    WeakPassword,
    #[error("note title must be between 1 and 120 visible characters")]
    InvalidNoteTitle,
    #[error("note body must not be empty")]
    InvalidNoteBody,
    #[error("tag must be 1-40 characters and must not contain commas or control characters")]
    InvalidTagLabel,
    #[error("user identifier must be a valid UUID")]
    InvalidUserId,
}

pub type ValidationResult<T> = Result<T, ModelValidationError>;
