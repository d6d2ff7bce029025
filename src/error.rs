//! Error types for meetscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeetscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Recognizer unavailable: {message}")]
    RecognizerUnavailable { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Session state machine guards
    #[error("A recording session is already active")]
    AlreadyRecording,

    #[error("Invalid state transition: cannot {operation} while {state}")]
    InvalidStateTransition { operation: String, state: String },

    // Internal invariant violations (merge-stage defects)
    #[error("Out-of-order append: expected sequence {expected}, got {got}")]
    OutOfOrderAppend { expected: u64, got: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl MeetscribeError {
    /// Returns true for errors that indicate a defect in the pipeline itself
    /// rather than a user-facing failure. External logging should flag these.
    pub fn is_internal(&self) -> bool {
        matches!(self, MeetscribeError::OutOfOrderAppend { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, MeetscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_unavailable_display() {
        let error = MeetscribeError::DeviceUnavailable {
            message: "no input device".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device unavailable: no input device");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = MeetscribeError::ConfigInvalidValue {
            key: "session.workers".to_string(),
            message: "must be at least 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for session.workers: must be at least 1"
        );
    }

    #[test]
    fn test_out_of_order_append_display() {
        let error = MeetscribeError::OutOfOrderAppend {
            expected: 3,
            got: 5,
        };
        assert_eq!(
            error.to_string(),
            "Out-of-order append: expected sequence 3, got 5"
        );
    }

    #[test]
    fn test_invalid_state_transition_display() {
        let error = MeetscribeError::InvalidStateTransition {
            operation: "stop".to_string(),
            state: "Idle".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid state transition: cannot stop while Idle"
        );
    }

    #[test]
    fn test_already_recording_display() {
        let error = MeetscribeError::AlreadyRecording;
        assert_eq!(error.to_string(), "A recording session is already active");
    }

    #[test]
    fn test_is_internal_classification() {
        let defect = MeetscribeError::OutOfOrderAppend {
            expected: 0,
            got: 1,
        };
        assert!(defect.is_internal());

        let user_facing = MeetscribeError::AlreadyRecording;
        assert!(!user_facing.is_internal());

        let recoverable = MeetscribeError::Recognition {
            message: "inference failed".to_string(),
        };
        assert!(!recoverable.is_internal());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: MeetscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: MeetscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<MeetscribeError>();
        assert_sync::<MeetscribeError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
