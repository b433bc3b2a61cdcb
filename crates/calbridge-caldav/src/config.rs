//! CalDAV client configuration.

use std::time::Duration;

use url::Url;

use crate::auth::Credential;
use crate::error::{CalDavError, CalDavResult};

/// Configuration for one calendar collection.
///
/// A config value is owned by exactly one [`CalDavClient`](crate::CalDavClient)
/// and never changes after the client is built.
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    /// URL of the calendar collection. Always ends with `/`.
    pub url: Url,

    /// Credential sent with every request.
    pub credential: Credential,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl CalDavConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration for the given collection URL.
    ///
    /// A trailing `/` is appended to the path when missing so that resource
    /// URLs resolve inside the collection.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid or not HTTP(S).
    pub fn new(url: impl AsRef<str>, credential: Credential) -> CalDavResult<Self> {
        let mut parsed = Url::parse(url.as_ref()).map_err(|e| {
            CalDavError::configuration(format!("invalid calendar URL {:?}: {}", url.as_ref(), e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CalDavError::configuration(format!(
                "calendar URL must be http or https, got {}",
                parsed.scheme()
            )));
        }

        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        Ok(Self {
            url: parsed,
            credential,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calbridge/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the collection URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the URL of the `<uid>.ics` resource inside the collection.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the joined URL is invalid.
    pub fn resource_url(&self, uid: &str) -> CalDavResult<Url> {
        let file = format!("{}.ics", urlencoding::encode(uid));
        self.url.join(&file).map_err(|e| {
            CalDavError::configuration(format!("cannot build resource URL for {:?}: {}", uid, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::basic("user", "pass")
    }

    #[test]
    fn config_creation() {
        let config =
            CalDavConfig::new("https://dav.example.com/calendars/user/personal/", credential())
                .unwrap();
        assert_eq!(
            config.url_str(),
            "https://dav.example.com/calendars/user/personal/"
        );
        assert!(config.verify_tls);
        assert_eq!(
            config.timeout,
            Duration::from_secs(CalDavConfig::DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn trailing_slash_is_added() {
        let config =
            CalDavConfig::new("https://dav.example.com/calendars/user/personal", credential())
                .unwrap();
        assert_eq!(
            config.url_str(),
            "https://dav.example.com/calendars/user/personal/"
        );
    }

    #[test]
    fn config_builder_methods() {
        let config = CalDavConfig::new("https://dav.example.com/cal/", credential())
            .unwrap()
            .with_insecure_tls()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent");

        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(CalDavConfig::new("not a valid url", credential()).is_err());
        assert!(CalDavConfig::new("ftp://dav.example.com/cal/", credential()).is_err());
    }

    #[test]
    fn resource_url_encodes_uid() {
        let config = CalDavConfig::new("https://dav.example.com/cal/", credential()).unwrap();
        assert_eq!(
            config.resource_url("abc-123").unwrap().as_str(),
            "https://dav.example.com/cal/abc-123.ics"
        );
        assert_eq!(
            config.resource_url("a b@host").unwrap().as_str(),
            "https://dav.example.com/cal/a%20b%40host.ics"
        );
    }
}
