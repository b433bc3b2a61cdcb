//! HTTP Basic credentials for CalDAV requests (RFC 7617).
//!
//! Only a pre-built credential is sent; no challenge/response negotiation
//! takes place.

use std::fmt;

use base64::Engine;

/// The credential attached to every request as an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A pre-encoded token, i.e. `base64(user:pass)` without the scheme.
    Token(String),
    /// A username/password pair, encoded on use.
    Basic { username: String, password: String },
}

impl Credential {
    /// Creates a credential from a pre-encoded token.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token(token.into())
    }

    /// Creates a credential from a username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Renders the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        match self {
            Self::Token(token) => {
                let token = token.trim();
                // Accept tokens that already carry the scheme.
                if token.starts_with("Basic ") {
                    token.to_string()
                } else {
                    format!("Basic {}", token)
                }
            }
            Self::Basic { username, password } => basic_auth(username, password),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}
