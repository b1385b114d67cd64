//! Error types for the comparison tool.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, NerCompareError>;

/// Errors that can occur while configuring or calling the model endpoints.
///
/// Endpoint failures never escape [`crate::dispatch::Dispatcher`]; they are
/// folded into a failed [`crate::dispatch::InferenceResult`] using the
/// `Display` text of these variants.
#[derive(Error, Debug)]
pub enum NerCompareError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered with a non-success status or an error document.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// The endpoint answered, but not with a chat-completion document.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl NerCompareError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for NerCompareError {
    fn from(err: reqwest::Error) -> Self {
        NerCompareError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for NerCompareError {
    fn from(err: serde_json::Error) -> Self {
        NerCompareError::LlmParse(err.to_string())
    }
}
