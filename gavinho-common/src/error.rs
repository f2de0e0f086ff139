//! Error type shared by the GAVINHO services
//!
//! Storage and domain failures are reported through one enum. HTTP layers
//! map `NotFound`, `InvalidInput` and `Conflict` to client errors and
//! everything else to 500.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite failure, including a lock not acquired within the busy timeout
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder could not be created or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config file exists but cannot be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown import batch or validation rule id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rule definition rejected: missing name or field, or a condition that
    /// does not decode for its rule type
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Import batch already reverted
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored rows that fail to convert to or from their models
    #[error("Internal error: {0}")]
    Internal(String),
}
