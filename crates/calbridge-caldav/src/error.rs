//! Error types for CalDAV operations.
//!
//! Every public operation surfaces one of these to its immediate caller;
//! nothing is retried or recovered internally.

use std::fmt;

use thiserror::Error;

/// The category of a [`CalDavError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Network or connection failure.
    Transport,
    /// The HTTP status did not match the operation's contract.
    UnexpectedStatus,
    /// The multistatus envelope is malformed.
    XmlParse,
    /// A calendar-data blob is not valid iCalendar.
    ICalParse,
    /// A single-resource fetch found no qualifying entry.
    NotFound,
    /// Missing or invalid configuration.
    Configuration,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorCode {
    /// Returns true if the failure is transient and the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Returns a stable machine-readable name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport_error",
            Self::UnexpectedStatus => "unexpected_status",
            Self::XmlParse => "xml_parse_error",
            Self::ICalParse => "ical_parse_error",
            Self::NotFound => "not_found",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by a CalDAV operation.
#[derive(Debug, Error)]
pub enum CalDavError {
    /// The request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a status outside the operation's contract.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The multistatus document is not well-formed or lacks its structure.
    #[error("invalid multistatus XML: {0}")]
    XmlParse(String),

    /// A calendar-data blob did not parse as iCalendar.
    #[error("invalid iCalendar data: {0}")]
    ICalParse(String),

    /// No qualifying resource was found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CalDavError {
    /// Creates a transport error without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping its cause.
    pub fn transport_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an unexpected status error.
    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            body: body.into(),
        }
    }

    /// Creates an XML parse error.
    pub fn xml_parse(message: impl Into<String>) -> Self {
        Self::XmlParse(message.into())
    }

    /// Creates an iCalendar parse error.
    pub fn ical_parse(message: impl Into<String>) -> Self {
        Self::ICalParse(message.into())
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } => ErrorCode::Transport,
            Self::UnexpectedStatus { .. } => ErrorCode::UnexpectedStatus,
            Self::XmlParse(_) => ErrorCode::XmlParse,
            Self::ICalParse(_) => ErrorCode::ICalParse,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns the HTTP status for [`CalDavError::UnexpectedStatus`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// A specialized Result type for CalDAV operations.
pub type CalDavResult<T> = Result<T, CalDavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        assert!(ErrorCode::Transport.is_retryable());
        assert!(!ErrorCode::UnexpectedStatus.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());
        assert!(!ErrorCode::XmlParse.is_retryable());
    }

    #[test]
    fn unexpected_status_carries_status_and_body() {
        let err = CalDavError::unexpected_status(412, "precondition failed");
        assert_eq!(err.code(), ErrorCode::UnexpectedStatus);
        assert_eq!(err.status(), Some(412));
        let display = err.to_string();
        assert!(display.contains("412"));
        assert!(display.contains("precondition failed"));
    }

    #[test]
    fn transport_error_keeps_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = CalDavError::transport_with_source("request failed", io_err);
        assert!(err.is_retryable());
        assert!(err.source().is_some());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn code_names() {
        assert_eq!(CalDavError::not_found("uid").code().as_str(), "not_found");
        assert_eq!(ErrorCode::ICalParse.to_string(), "ical_parse_error");
    }
}
