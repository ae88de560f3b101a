//! Error types for Startline

use thiserror::Error;

/// Main error type for Startline. Domain-specific failures live in the
/// per-manager error enums; this covers the shared infrastructure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Startline
pub type Result<T> = std::result::Result<T, Error>;
