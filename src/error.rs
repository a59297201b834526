//! Error types for Tollgate.

use thiserror::Error;

/// Main error type for Tollgate operations.
#[derive(Error, Debug)]
pub enum TollgateError {
    /// A limiter was constructed with a parameter outside its valid range
    #[error("Invalid limiter configuration: {param} must be positive, got {value}")]
    InvalidConfig {
        /// Name of the offending parameter
        param: &'static str,
        /// The rejected value, rendered for display
        value: String,
    },

    /// Configuration loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TollgateError {
    pub(crate) fn invalid(param: &'static str, value: impl ToString) -> Self {
        TollgateError::InvalidConfig {
            param,
            value: value.to_string(),
        }
    }
}

impl From<::config::ConfigError> for TollgateError {
    fn from(err: ::config::ConfigError) -> Self {
        TollgateError::Config(err.to_string())
    }
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, TollgateError>;
