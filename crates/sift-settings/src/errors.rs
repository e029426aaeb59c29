//! Settings error taxonomy.

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors surfaced while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File read failure.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
