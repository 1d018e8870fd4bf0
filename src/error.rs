//! Error types for gesture recognition and spell fusion.
//!
//! Every failure is scoped to the single stroke or fusion check that caused
//! it. [`RecognitionError::is_recoverable`] separates the "nothing happens"
//! rejections from faults the caller may want to surface.

use thiserror::Error;

/// Main error type for recognition operations.
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// Stroke has too few points to be recognized.
    #[error("Insufficient data: need at least {min} points, got {actual}")]
    InsufficientData { min: usize, actual: usize },

    /// All points coincide; the bounding box has no extent.
    #[error("Degenerate stroke: bounding box {width} x {height}")]
    DegenerateStroke { width: f32, height: f32 },

    /// No inference runtime has been attached.
    #[error("Inference runtime not ready")]
    NotReady,

    /// The runtime failed or returned a malformed tensor.
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure (export, config, debug dumps).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Training sample written with a format this build does not read.
    #[error("Unsupported training sample version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Result type alias for recognition operations.
pub type Result<T> = std::result::Result<T, RecognitionError>;

impl RecognitionError {
    /// Create an insufficient data error.
    #[must_use]
    pub const fn insufficient_data(min: usize, actual: usize) -> Self {
        Self::InsufficientData { min, actual }
    }

    /// Create a degenerate stroke error.
    #[must_use]
    pub const fn degenerate(width: f32, height: f32) -> Self {
        Self::DegenerateStroke { width, height }
    }

    /// Create an inference error.
    #[must_use]
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceError(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Rejections that abort the attempt silently rather than report a fault.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::DegenerateStroke { .. }
        )
    }
}

impl From<serde_json::Error> for RecognitionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecognitionError::insufficient_data(3, 2);
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_recoverable_classes() {
        assert!(RecognitionError::insufficient_data(3, 1).is_recoverable());
        assert!(RecognitionError::degenerate(0.0, 0.0).is_recoverable());
        assert!(!RecognitionError::NotReady.is_recoverable());
        assert!(!RecognitionError::inference("bad shape").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: RecognitionError = parse.unwrap_err().into();
        assert!(matches!(err, RecognitionError::Serialization(_)));
    }
}
