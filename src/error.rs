//! Error types for fxpipe.
//!
//! Everything fallible happens at configuration or graph-construction time.
//! The running pipeline has no error channel: numeric overflow saturates and
//! protocol violations deadlock by design.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FxpipeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Topology construction errors
    #[error("Invalid topology: {message}")]
    Topology { message: String },

    #[error("Channel count mismatch: expected {expected} cascades, got {actual}")]
    CascadeCount { expected: usize, actual: usize },

    #[error("Coefficient set must have exactly 5 words, got {actual}")]
    CoefficientLength { actual: usize },

    #[error("Q format {q} out of range (1..=30)")]
    QFormat { q: u32 },

    // Transport bridge wiring errors
    #[error("Transport bridge channel already wired")]
    BridgeAlreadyWired,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, FxpipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_display() {
        let error = FxpipeError::Topology {
            message: "split partitions overlap".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid topology: split partitions overlap"
        );
    }

    #[test]
    fn test_cascade_count_display() {
        let error = FxpipeError::CascadeCount {
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            error.to_string(),
            "Channel count mismatch: expected 2 cascades, got 3"
        );
    }

    #[test]
    fn test_coefficient_length_display() {
        let error = FxpipeError::CoefficientLength { actual: 4 };
        assert_eq!(
            error.to_string(),
            "Coefficient set must have exactly 5 words, got 4"
        );
    }

    #[test]
    fn test_q_format_display() {
        let error = FxpipeError::QFormat { q: 40 };
        assert_eq!(error.to_string(), "Q format 40 out of range (1..=30)");
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: FxpipeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error: FxpipeError = io_error.into();
        assert!(error.to_string().contains("no such file"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<FxpipeError>();
        assert_sync::<FxpipeError>();
    }
}
