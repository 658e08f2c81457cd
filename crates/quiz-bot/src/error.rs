//! Error types for quiz bot operations

use thiserror::Error;

/// Quiz bot specific errors
#[derive(Debug, Error)]
pub enum QuizError {
    /// A quiz question failed its non-empty-field invariant
    #[error("validation error: {0}")]
    Validation(String),

    /// The question set is empty or a drawn record is not a valid question
    #[error("question store is empty or corrupt: {0}")]
    StoreEmptyOrCorrupt(String),

    /// The backing store rejected an operation
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Serialization of a stored record failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A source file could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network or HTTP error on a transport channel
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A platform API answered with an error payload
    #[error("API error: {0}")]
    Api(String),

    /// A required setting is absent or malformed
    #[error("configuration error:\n{0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for quiz bot operations
pub type Result<T> = std::result::Result<T, QuizError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuizError::Validation("Question text is not presented.".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: Question text is not presented."
        );

        let err = QuizError::StoreEmptyOrCorrupt("the question set is empty".to_string());
        assert!(err.to_string().contains("empty or corrupt"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QuizError = json_err.into();
        assert!(matches!(err, QuizError::Json(_)));
    }
}
