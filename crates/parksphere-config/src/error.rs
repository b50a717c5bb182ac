//! Configuration error types.

/// Errors that can occur when loading, saving, parsing, or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `config.ron` could not be read.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// `config.ron` (or its directory) could not be written.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// The file is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Serializing to RON failed.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),

    /// A value parsed fine but is outside the range the engine accepts.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field, e.g. `camera.orbit.min_distance`.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
}
