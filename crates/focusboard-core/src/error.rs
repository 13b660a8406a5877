use thiserror::Error;

/// Rejected input to one of the `add`/`record` operations.
///
/// Callers surface the message to the user; nothing in the core
/// retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid date: {value}")]
    InvalidDate { value: String },

    #[error("mood level must be between 1 and 5, got {level}")]
    MoodLevelOutOfRange { level: i64 },
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

/// Trims `value` and fails with [`ValidationError::MissingField`] when
/// nothing is left.
pub fn require(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(trimmed.to_string())
}
