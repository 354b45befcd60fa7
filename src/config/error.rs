//! Configuration validation errors.

/// Invalid configuration value, naming the offending field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Value outside its allowed range
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        /// Dotted field path, e.g. `matcher.same_threshold`
        field: &'static str,
        /// Offending value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Inclusive upper bound
        max: f64,
    },

    /// Value violates a non-range constraint
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// Two related thresholds in the wrong order
    #[error("{lower} must not exceed {upper}")]
    Ordering {
        /// Field that must be the smaller one
        lower: &'static str,
        /// Field that must be the larger one
        upper: &'static str,
    },
}
