//! Settings error type.

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Config file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file was not valid JSON (or did not fit the schema).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A loaded value violated its constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}
