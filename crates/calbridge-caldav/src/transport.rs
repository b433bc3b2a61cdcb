//! The HTTP transport seam.
//!
//! The facade only needs "send a request, get back a status and a body".
//! [`Transport`] captures exactly that, so tests can substitute an in-memory
//! implementation and callers can bring their own retry or pooling policy.
//! [`ReqwestTransport`] is the default implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::Client;
use tracing::trace;

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};

/// A boxed future that is Send and has a lifetime tied to the transport.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The HTTP methods used by CalDAV operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Report,
    Propfind,
    Put,
    Delete,
    Get,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "REPORT",
            Self::Propfind => "PROPFIND",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Builder method to add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder method to set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the first value of a header (case-insensitive name match).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends HTTP requests on behalf of the facade.
///
/// Implementations report network failures as [`CalDavError::Transport`] and
/// return every HTTP status, successful or not, as an [`HttpResponse`].
pub trait Transport: Send + Sync {
    /// Sends one request.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, CalDavResult<HttpResponse>>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport honouring the timeout, TLS and user agent settings.
    pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| CalDavError::transport_with_source("failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, CalDavResult<HttpResponse>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|_| CalDavError::internal(format!("invalid method {}", request.method)))?;

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            trace!(method = %request.method, url = %request.url, "Sending request");

            let response = builder.send().await.map_err(|e| {
                CalDavError::transport_with_source(format!("{} {} failed", request.method, request.url), e)
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| CalDavError::transport_with_source("failed to read response body", e))?;

            trace!(status, bytes = body.len(), "Received response");

            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;

    #[test]
    fn method_names() {
        assert_eq!(Method::Report.as_str(), "REPORT");
        assert_eq!(Method::Propfind.to_string(), "PROPFIND");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn request_builder_and_header_lookup() {
        let request = HttpRequest::new(Method::Report, "https://dav.example.com/cal/")
            .with_header("Depth", "1")
            .with_header("Content-Type", "application/xml; charset=utf-8")
            .with_body("<x/>");

        assert_eq!(request.header("depth"), Some("1"));
        assert_eq!(
            request.header("CONTENT-TYPE"),
            Some("application/xml; charset=utf-8")
        );
        assert_eq!(request.header("Prefer"), None);
        assert_eq!(request.body.as_deref(), Some("<x/>"));
    }

    #[test]
    fn reqwest_transport_creation() {
        let config =
            CalDavConfig::new("https://dav.example.com/cal/", Credential::token("abc")).unwrap();
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
