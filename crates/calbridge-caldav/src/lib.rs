//! CalDAV protocol translation.
//!
//! This crate turns calendar operations into CalDAV requests and decodes
//! the answers:
//!
//! - [`query`] - XML bodies for REPORT and PROPFIND
//! - [`multistatus`] - namespace-aware multistatus decoding
//! - [`ics`] - iCalendar to [`Event`](calbridge_core::Event) normalization
//! - [`CalDavClient`] - the operation facade
//! - [`Transport`] - the HTTP seam, with [`ReqwestTransport`] as default
//!
//! # Architecture
//!
//! ```text
//!   CalDavClient ──query──▶ XML body ──▶ Transport ──▶ (status, body)
//!        │                                                  │
//!        │            status check (207 / 201 / 204 / 200)  │
//!        ▼                                                  ▼
//!   EventList / Event ◀── ics::parse_calendar_data ◀── multistatus
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calbridge_caldav::{CalDavClient, CalDavConfig, Credential};
//!
//! let config = CalDavConfig::new(
//!     "https://dav.example.com/calendars/alice/work/",
//!     Credential::basic("alice", "secret"),
//! )?;
//! let client = CalDavClient::new(config)?;
//! let list = client.get_events().await?;
//! println!("{} events, {} skipped", list.events.len(), list.skipped_count());
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod ics;
pub mod multistatus;
pub mod query;
pub mod transport;

// Re-export main types at crate root
pub use auth::{Credential, basic_auth};
pub use client::{CalDavClient, EventList, SkippedResource, WriteOutcome};
pub use config::CalDavConfig;
pub use error::{CalDavError, CalDavResult, ErrorCode};
pub use multistatus::{CollectionTag, RawCalendarResource, ResourceTag};
pub use transport::{BoxFuture, HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
