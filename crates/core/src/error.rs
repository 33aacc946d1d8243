use thiserror::Error;

pub type AudienceResult<T> = Result<T, AudienceError>;

#[derive(Error, Debug)]
pub enum AudienceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AudienceError {
    /// Validation failure naming the offending field.
    pub fn invalid_field(field: &str, detail: impl std::fmt::Display) -> Self {
        AudienceError::Validation(format!("field '{field}': {detail}"))
    }
}
