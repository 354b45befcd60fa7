//! Error types for pada-match

use crate::config::ConfigError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// pada-match error types
///
/// Tolerance violations found by the validator are not errors; they are
/// reported as failed checks in a [`crate::validation::ValidationReport`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not enough usable input for a stage
    #[error("Insufficient input for {stage}: needed {needed}, found {found}")]
    InsufficientInput {
        /// Stage that rejected the input
        stage: &'static str,
        /// Minimum count required
        needed: usize,
        /// Count actually available
        found: usize,
    },

    /// Internal numeric fault (non-finite intermediate result)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a non-finite numeric fault
    pub fn non_finite(what: &str) -> Self {
        Error::Internal(format!("non-finite {}", what))
    }
}
