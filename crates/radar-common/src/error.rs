//! Error types for the radar-nowcast client.

use thiserror::Error;

/// Result type alias using RadarError.
pub type RadarResult<T> = Result<T, RadarError>;

/// Primary error type for the nowcast client.
#[derive(Debug, Error)]
pub enum RadarError {
    // === Wire errors ===
    #[error("Failed to fetch '{url}': {message}")]
    FetchFailed { url: String, message: String },

    #[error("Invalid tile-set capability: {0}")]
    InvalidCapability(String),

    #[error("Invalid forecast description: {0}")]
    InvalidForecast(String),

    // === Color map errors ===
    #[error("Color map not found: {0}")]
    ColorMapNotFound(String),

    #[error("Invalid color map: {0}")]
    InvalidColorMap(String),

    // === Infrastructure errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RadarError {
    /// True for failures that leave the client in its last good state
    /// rather than tearing anything down (fetch and parse failures).
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            RadarError::FetchFailed { .. }
                | RadarError::InvalidCapability(_)
                | RadarError::InvalidForecast(_)
        )
    }
}

// Conversion from common error types
impl From<std::io::Error> for RadarError {
    fn from(err: std::io::Error) -> Self {
        RadarError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RadarError {
    fn from(err: serde_json::Error) -> Self {
        RadarError::Internal(format!("JSON error: {}", err))
    }
}
