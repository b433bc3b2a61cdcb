//! The CalDAV operation facade.
//!
//! Each operation builds its request body, sends it through the
//! [`Transport`], checks the HTTP status against the operation's contract and
//! only then decodes the multistatus and iCalendar payloads.

use serde::Serialize;
use tracing::{debug, info, warn};

use calbridge_core::{Event, TimeRange};

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};
use crate::ics::{parse_calendar_data, write_minimal_event};
use crate::multistatus::{
    CollectionTag, RawCalendarResource, ResourceTag, collection_tag, parse_calendar_resources,
    parse_multistatus, resource_tags,
};
use crate::query;
use crate::transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;
const STATUS_NO_CONTENT: u16 = 204;
const STATUS_MULTI_STATUS: u16 = 207;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Result of a list operation.
///
/// Resources whose calendar data could not be decoded are reported in
/// `skipped` instead of failing the whole call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventList {
    pub events: Vec<Event>,
    pub skipped: Vec<SkippedResource>,
}

impl EventList {
    /// Returns the number of resources that were dropped.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// A qualifying resource whose calendar data failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedResource {
    pub href: String,
    pub reason: String,
}

/// What a successful PUT did on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// 201: the resource did not exist.
    Created,
    /// 204: an existing resource was replaced.
    Updated,
}

/// Client for one calendar collection.
///
/// Holds no state besides its configuration and transport, so concurrent
/// calls on a shared reference are independent of each other.
#[derive(Debug)]
pub struct CalDavClient<T: Transport = ReqwestTransport> {
    config: CalDavConfig,
    transport: T,
}

impl CalDavClient<ReqwestTransport> {
    /// Creates a client backed by a `reqwest` transport.
    pub fn new(config: CalDavConfig) -> CalDavResult<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: Transport> CalDavClient<T> {
    /// Creates a client using the given transport.
    pub fn with_transport(config: CalDavConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &CalDavConfig {
        &self.config
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the event with the given UID.
    ///
    /// The first `200 OK` resource wins when several match; the rest are
    /// only logged. Inside that resource the VEVENT carrying `uid` is
    /// preferred over its siblings.
    ///
    /// # Errors
    ///
    /// - [`CalDavError::UnexpectedStatus`] unless the server answers 207
    /// - [`CalDavError::NotFound`] if no `200 OK` resource matched
    /// - [`CalDavError::ICalParse`] if the matching resource is not valid iCalendar
    pub async fn get_event_by_uid(&self, uid: &str) -> CalDavResult<Event> {
        let body = query::calendar_query_by_uid(uid)?;
        let xml = self.report(body, false).await?;

        let resources = parse_calendar_resources(&xml)?;
        if resources.len() > 1 {
            warn!(uid, count = resources.len(), "Multiple resources match UID, using the first");
        }
        let resource = resources
            .into_iter()
            .next()
            .ok_or_else(|| CalDavError::not_found(format!("no event with UID {:?}", uid)))?;

        let mut events = parse_calendar_data(&resource.data)?;
        if events.is_empty() {
            return Err(CalDavError::not_found(format!(
                "resource {} holds no VEVENT",
                resource.href
            )));
        }
        let position = events.iter().position(|e| e.id == uid).unwrap_or(0);
        let event = events.swap_remove(position);

        info!(uid, href = %resource.href, "Fetched event");
        Ok(event)
    }

    /// Lists every event in the collection.
    pub async fn get_events(&self) -> CalDavResult<EventList> {
        let body = query::calendar_query_all()?;
        let xml = self.report(body, true).await?;
        let events = decode_resources(parse_calendar_resources(&xml)?);
        info!(
            count = events.events.len(),
            skipped = events.skipped_count(),
            "Listed events"
        );
        Ok(events)
    }

    /// Lists the events overlapping `range`.
    pub async fn get_events_between(&self, range: &TimeRange) -> CalDavResult<EventList> {
        let body = query::calendar_query_between(range)?;
        let xml = self.report(body, true).await?;
        let events = decode_resources(parse_calendar_resources(&xml)?);
        info!(
            start = %range.start,
            end = ?range.end,
            count = events.events.len(),
            skipped = events.skipped_count(),
            "Listed events in range"
        );
        Ok(events)
    }

    /// Fetches the named resources with a single `calendar-multiget`.
    pub async fn multiget_events<S: AsRef<str>>(&self, hrefs: &[S]) -> CalDavResult<EventList> {
        if hrefs.is_empty() {
            debug!("Multiget without hrefs, nothing to fetch");
            return Ok(EventList::default());
        }

        let body = query::calendar_multiget(hrefs)?;
        let xml = self.report(body, true).await?;
        let events = decode_resources(parse_calendar_resources(&xml)?);
        info!(
            requested = hrefs.len(),
            count = events.events.len(),
            skipped = events.skipped_count(),
            "Fetched events by href"
        );
        Ok(events)
    }

    /// Writes `event` as a minimal VCALENDAR to `<uid>.ics`.
    ///
    /// Attendees and recurrence are not written; use
    /// [`put_event_ics`](Self::put_event_ics) to store a complete body.
    pub async fn create_update_event(&self, event: &Event) -> CalDavResult<WriteOutcome> {
        let ics = write_minimal_event(event);
        self.put_event_ics(&event.id, &ics).await
    }

    /// Writes a caller-supplied iCalendar body to `<uid>.ics`.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::UnexpectedStatus`] for any status other than
    /// 201 or 204.
    pub async fn put_event_ics(&self, uid: &str, ics: &str) -> CalDavResult<WriteOutcome> {
        let url = self.config.resource_url(uid)?;
        let request = self
            .request(Method::Put, url.as_str())
            .with_header("Content-Type", ICS_CONTENT_TYPE)
            .with_body(ics);

        let response = self.transport.send(request).await?;
        let outcome = match response.status {
            STATUS_CREATED => WriteOutcome::Created,
            STATUS_NO_CONTENT => WriteOutcome::Updated,
            _ => return Err(unexpected(response)),
        };

        info!(uid, outcome = ?outcome, "Stored event");
        Ok(outcome)
    }

    /// Deletes `<uid>.ics`.
    pub async fn delete_event(&self, uid: &str) -> CalDavResult<()> {
        let url = self.config.resource_url(uid)?;
        let request = self.request(Method::Delete, url.as_str());
        self.send_expecting(request, STATUS_NO_CONTENT).await?;
        info!(uid, "Deleted event");
        Ok(())
    }

    /// Reads the collection's display name and ctag (Depth 0 PROPFIND).
    pub async fn get_ctag(&self) -> CalDavResult<CollectionTag> {
        let request = self
            .request(Method::Propfind, self.config.url_str())
            .with_header("Depth", "0")
            .with_header("Content-Type", XML_CONTENT_TYPE)
            .with_body(query::propfind_ctag()?);

        let response = self.send_expecting(request, STATUS_MULTI_STATUS).await?;
        let tag = collection_tag(&parse_multistatus(&response.body)?)
            .ok_or_else(|| CalDavError::not_found("collection returned no 200 OK properties"))?;

        debug!(href = %tag.href, ctag = ?tag.ctag, "Fetched collection tag");
        Ok(tag)
    }

    /// Lists the ETag of every event resource.
    pub async fn get_etags(&self) -> CalDavResult<Vec<ResourceTag>> {
        let body = query::calendar_query_etags()?;
        let xml = self.report(body, true).await?;
        let tags = resource_tags(&parse_multistatus(&xml)?);
        debug!(count = tags.len(), "Fetched resource tags");
        Ok(tags)
    }

    /// Downloads the raw iCalendar text of `<uid>.ics`.
    pub async fn get_event_source(&self, uid: &str) -> CalDavResult<String> {
        let url = self.config.resource_url(uid)?;
        let request = self.request(Method::Get, url.as_str());
        let response = self.send_expecting(request, STATUS_OK).await?;
        Ok(response.body)
    }

    fn request(&self, method: Method, url: &str) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("Authorization", self.config.credential.authorization_header())
    }

    /// Sends a Depth 1 REPORT to the collection and returns the 207 body.
    async fn report(&self, body: String, minimal: bool) -> CalDavResult<String> {
        let mut request = self
            .request(Method::Report, self.config.url_str())
            .with_header("Depth", "1")
            .with_header("Content-Type", XML_CONTENT_TYPE);
        if minimal {
            request = request.with_header("Prefer", "return-minimal");
        }

        let response = self
            .send_expecting(request.with_body(body), STATUS_MULTI_STATUS)
            .await?;
        Ok(response.body)
    }

    async fn send_expecting(
        &self,
        request: HttpRequest,
        expected: u16,
    ) -> CalDavResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "CalDAV request");
        let response = self.transport.send(request).await?;
        if response.status != expected {
            return Err(unexpected(response));
        }
        Ok(response)
    }
}

fn unexpected(response: HttpResponse) -> CalDavError {
    warn!(status = response.status, "Unexpected HTTP status");
    CalDavError::unexpected_status(response.status, response.body)
}

/// Decodes each resource on its own, so one bad blob does not sink the batch.
fn decode_resources(resources: Vec<RawCalendarResource>) -> EventList {
    let mut list = EventList::default();
    for resource in resources {
        match parse_calendar_data(&resource.data) {
            Ok(events) => list.events.extend(events),
            Err(e) => {
                warn!(href = %resource.href, error = %e, "Skipping undecodable resource");
                list.skipped.push(SkippedResource {
                    href: resource.href,
                    reason: e.to_string(),
                });
            }
        }
    }
    list
}
