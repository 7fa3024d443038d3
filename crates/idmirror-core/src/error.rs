//! Error types for idmirror operations.
//!
//! One error enum covers the remote identity API, the directory store, and
//! configuration handling, so every crate in the workspace shares a single
//! `Result` alias and a single place where transport errors are classified.

use thiserror::Error;

/// Main error type for idmirror operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The remote identity service is unreachable or answering with 5xx.
    #[error("Remote service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An HTTP request failed for a reason other than availability.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// A remote or directory operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The requested record does not exist remotely.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A credential was rejected by the remote service.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A base URL or request path was malformed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A directory name could not be parsed or constructed.
    #[error("Invalid directory name: {0}")]
    InvalidName(String),

    /// Invalid request against a local contract.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An external collaborator (directory backend, identity API) failed.
    #[error("External service error: {service}: {message}")]
    ExternalServiceError {
        /// Collaborator that failed (e.g. `directory`, `identity-api`).
        service: String,
        /// Error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for idmirror operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the stable error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidName(_) => "INVALID_NAME",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::ExternalServiceError { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::ExternalServiceError { .. }
        )
    }

    /// Returns true if the failure is plausibly transient and worth
    /// retrying on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_) | Self::Timeout(_) | Self::HttpError(_)
        )
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::ServiceUnavailable("test".to_string()).error_code(),
            "SERVICE_UNAVAILABLE"
        );
        assert_eq!(
            Error::HttpError("test".to_string()).error_code(),
            "HTTP_ERROR"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::AuthenticationFailed("test".to_string()).error_code(),
            "AUTHENTICATION_FAILED"
        );
        assert_eq!(
            Error::ParseError("test".to_string()).error_code(),
            "PARSE_ERROR"
        );
        assert_eq!(
            Error::ConfigError("test".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::InvalidName("test".to_string()).error_code(),
            "INVALID_NAME"
        );
        assert_eq!(
            Error::ExternalServiceError {
                service: "directory".to_string(),
                message: "msg".to_string()
            }
            .error_code(),
            "EXTERNAL_SERVICE_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::ServiceUnavailable("identity-api".to_string());
        assert_eq!(err.to_string(), "Remote service unavailable: identity-api");

        let err = Error::ExternalServiceError {
            service: "directory".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "External service error: directory: connection refused"
        );
    }

    #[test]
    fn test_should_log() {
        assert!(Error::InternalError("test".to_string()).should_log());
        assert!(Error::ConfigError("test".to_string()).should_log());
        assert!(Error::ExternalServiceError {
            service: "directory".to_string(),
            message: "msg".to_string()
        }
        .should_log());

        assert!(!Error::NotFound("test".to_string()).should_log());
        assert!(!Error::AuthenticationFailed("test".to_string()).should_log());
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::Timeout("test".to_string()).is_transient());
        assert!(Error::ServiceUnavailable("test".to_string()).is_transient());
        assert!(!Error::NotFound("test".to_string()).is_transient());
        assert!(!Error::AuthenticationFailed("test".to_string()).is_transient());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let core_err: Error = err.into();
        assert!(matches!(core_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let core_err: Error = err.into();
        assert!(matches!(core_err, Error::ParseError(_)));
    }

    #[test]
    fn test_error_clone_and_eq() {
        let err = Error::NotFound("test".to_string());
        assert_eq!(err, err.clone());
        assert_ne!(err, Error::NotFound("other".to_string()));
    }
}
