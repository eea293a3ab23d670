//! Error types for the threadlens application.

use threadlens_search::SearchError;

/// Top-level error type for answering a question.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Forum search failed.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Language-model request or response error.
    #[error("model error: {0}")]
    Model(String),

    /// The request was cancelled or ran past its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_errors_display_transparently() {
        let err = AppError::from(SearchError::Timeout("search cancelled".into()));
        assert_eq!(err.to_string(), "[TIMEOUT] search cancelled");
    }

    #[test]
    fn timeouts_display_their_cause() {
        let err = AppError::Timeout("model request cancelled".into());
        assert_eq!(err.to_string(), "timeout: model request cancelled");
    }

    #[test]
    fn io_errors_convert() {
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().starts_with("I/O error"));
    }
}
