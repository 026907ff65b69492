//! Error types for the financial tutor backend

use thiserror::Error;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, TutorError>;

#[derive(Error, Debug)]
pub enum TutorError {

    // =============================
    // Core Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model transport failure: {0}")]
    Transport(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Document write failed: {0}")]
    WriteFailed(String),

    #[error("Batch commit failed: {0}")]
    BatchFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TutorError {
    /// Whether retrying the whole call can succeed without changing inputs.
    ///
    /// Transport failures are transient. Schema violations are not: the
    /// prompt has to change before a retry makes sense.
    pub fn is_transient(&self) -> bool {
        matches!(self, TutorError::Transport(_) | TutorError::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_transient() {
        let err = TutorError::Transport("connection reset".to_string());
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_output_is_not_transient() {
        let err = TutorError::MalformedOutput("missing field `answer`".to_string());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_failure_variants_are_distinguishable() {
        let transport = TutorError::Transport("timeout".to_string());
        let malformed = TutorError::MalformedOutput("not JSON".to_string());

        assert!(matches!(transport, TutorError::Transport(_)));
        assert!(matches!(malformed, TutorError::MalformedOutput(_)));
    }
}
