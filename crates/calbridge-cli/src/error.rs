//! Client error types.

use std::fmt;

use calbridge_caldav::CalDavError;
use calbridge_core::{TimeError, TracingError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// CalDAV operation failed.
    CalDav(CalDavError),
    /// Invalid command-line input.
    Input(String),
    /// IO error.
    Io(std::io::Error),
    /// Logging could not be initialised.
    Logging(TracingError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::CalDav(err) => write!(f, "{} ({})", err, err.code()),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Logging(err) => write!(f, "logging setup failed: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CalDav(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Logging(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CalDavError> for ClientError {
    fn from(err: CalDavError) -> Self {
        Self::CalDav(err)
    }
}

impl From<TimeError> for ClientError {
    fn from(err: TimeError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Logging(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caldav_errors_show_their_code() {
        let err = ClientError::from(CalDavError::not_found("no event with UID \"x\""));
        let text = err.to_string();
        assert!(text.contains("not found"));
        assert!(text.contains("(not_found)"));
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error;
        let err = ClientError::from(CalDavError::transport("connection refused"));
        assert!(err.source().is_some());
        assert!(ClientError::Config("x".into()).source().is_none());
    }
}
