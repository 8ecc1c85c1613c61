//! Error types for DrishtiIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DrishtiIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Telegram failed frame validation (length, start marker, or CRC)
    #[error("Invalid telegram: {0}")]
    InvalidFrame(String),

    /// IMU telegram failed its own length/CRC validation
    #[error("Invalid IMU telegram: {0}")]
    InvalidImuFrame(String),

    /// Buffer ran out of bytes mid-parse
    #[error("Truncated data: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
