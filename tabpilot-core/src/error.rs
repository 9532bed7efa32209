//! Error types for the tabpilot core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering browser session, LLM, and configuration domains.

use std::path::PathBuf;

/// Top-level error type for the tabpilot core library.
#[derive(Debug, thiserror::Error)]
pub enum TabpilotError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the browser session manager and CDP backends.
///
/// Only `AcquisitionFailed` is meant to cross the session manager's boundary:
/// per-attempt connect failures are retried internally, and cleanup failures
/// are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("session acquisition failed after {attempts} attempts: {message}")]
    AcquisitionFailed { attempts: u32, message: String },

    #[error("CDP connect failed: {message}")]
    Connect { message: String },

    #[error("session error: {message}")]
    Session { message: String },

    #[error("page operation failed: {message}")]
    Page { message: String },

    #[error("script evaluation failed: {message}")]
    Evaluate { message: String },
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Completion contained no choices")]
    EmptyCompletion,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `TabpilotError`.
pub type Result<T> = std::result::Result<T, TabpilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_browser() {
        let err = TabpilotError::Browser(BrowserError::AcquisitionFailed {
            attempts: 3,
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "Browser error: session acquisition failed after 3 attempts: connection refused"
        );
    }

    #[test]
    fn test_error_display_connect() {
        let err = BrowserError::Connect {
            message: "ws handshake failed".into(),
        };
        assert_eq!(err.to_string(), "CDP connect failed: ws handshake failed");
    }

    #[test]
    fn test_error_display_llm() {
        let err = TabpilotError::Llm(LlmError::ApiRequest {
            message: "429 Too Many Requests".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: 429 Too Many Requests"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = TabpilotError::Config(ConfigError::FileNotFound {
            path: PathBuf::from("/etc/tabpilot.toml"),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: /etc/tabpilot.toml"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TabpilotError = io_err.into();
        assert!(matches!(err, TabpilotError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: TabpilotError = serde_err.into();
        assert!(matches!(err, TabpilotError::Serialization(_)));
    }
}
