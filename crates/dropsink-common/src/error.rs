//! Error types shared across the dropsink workspace

use thiserror::Error;

/// Result type alias for dropsink operations
pub type Result<T> = std::result::Result<T, DropsinkError>;

/// Main error type for dropsink
#[derive(Error, Debug)]
pub enum DropsinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
