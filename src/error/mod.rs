use std::error::Error as StdError;
use std::fmt;

/// A single field that failed schema validation.
///
/// `value` is already redacted for secret fields, so the error can be logged as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}={value:?}: {reason}")]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    /// Every field violation found in one schema pass.
    InvalidFields(Vec<FieldError>),
    /// Names of the variables production mode requires but did not get.
    MissingProductionSecrets(Vec<String>),
    Configuration(String),
    Io(String),
    External(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidFields(errors) => {
                write!(f, "Invalid configuration ({} field(s)): ", errors.len())?;
                for (i, error) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", error)?;
                }
                Ok(())
            }
            AppError::MissingProductionSecrets(names) => write!(
                f,
                "Missing required environment variables for production: {}",
                names.join(", ")
            ),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            AppError::External(e) => write!(f, "External service error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl StdError for AppError {}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Io(error.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> Self {
        AppError::External(format!("Redis error: {}", error))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::External(format!("Database error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        AppError::Configuration(format!("Failed to read env file: {}", error))
    }
}

// Define AppResult type alias for Result<T, AppError>
pub type AppResult<T> = Result<T, AppError>;
