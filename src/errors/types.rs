//! Error type definitions for guide providers
//!
//! This module defines all error types used throughout the crate, providing a
//! hierarchical error system that separates configuration mistakes (fatal to
//! setup) from fetch and refresh failures (recoverable on the next cycle).

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the crate.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Source handling errors (fetching or parsing guide data)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors raised while constructing a provider
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Refresh failures; the provider keeps serving its last good data
    #[error("Refresh failed for {provider}: {message}")]
    Refresh { provider: String, message: String },

    /// External service errors
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source handling specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Authentication failures
    #[error("Authentication failed: {source_type} - {message}")]
    AuthenticationFailed { source_type: String, message: String },

    /// Parsing errors for source data
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// HTTP errors from external sources
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Anything else that went wrong talking to a source
    #[error("Fetch failed: {message}")]
    FetchFailed { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a refresh error for the named provider
    pub fn refresh<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Refresh {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a generic source error
    pub fn source_error<S: Into<String>>(message: S) -> Self {
        Self::Source(SourceError::FetchFailed {
            message: message.into(),
        })
    }

    /// Whether this error came from rejected provider settings
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl SourceError {
    /// Create an authentication failed error
    pub fn auth_failed<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::AuthenticationFailed {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = AppError::configuration("XMLTVURL is required");
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration error: XMLTVURL is required");
    }

    #[test]
    fn test_source_error_wraps_into_app_error() {
        let err: AppError = SourceError::auth_failed("schedules_direct", "invalid user").into();
        assert!(!err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Source error: Authentication failed: schedules_direct - invalid user"
        );
    }
}
