//! WebDAV multistatus decoding.
//!
//! Elements are matched on their expanded name (namespace URI plus local
//! name), so `D:href`, `d:href` and a default-namespace `href` are the same
//! element, and `C:calendar-data` / `cal:calendar-data` likewise.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use serde::Serialize;
use tracing::debug;

use crate::error::{CalDavError, CalDavResult};
use crate::query::{CALDAV_NS, CS_NS, DAV_NS};

/// The only sub-status that qualifies a resource.
pub const STATUS_OK: &str = "HTTP/1.1 200 OK";

/// One `<response>` of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultistatusResponse {
    /// The first `href` directly under the response.
    pub href: Option<String>,
    /// Response-level `status`, used by servers for whole-resource failures.
    pub status: Option<String>,
    /// The `propstat` blocks in document order.
    pub propstats: Vec<Propstat>,
}

/// One `<propstat>`: a status and the properties it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propstat {
    pub status: Option<String>,
    pub calendar_data: Option<String>,
    pub etag: Option<String>,
    pub display_name: Option<String>,
    pub ctag: Option<String>,
}

impl Propstat {
    fn is_ok(&self) -> bool {
        status_is_ok(self.status.as_deref())
    }
}

/// A multistatus entry that carried calendar data with a `200 OK` sub-status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCalendarResource {
    pub href: String,
    pub status: String,
    /// Verbatim iCalendar text.
    pub data: String,
}

/// The ETag of one calendar resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTag {
    pub href: String,
    /// ETag with surrounding quotes removed.
    pub etag: String,
}

/// Collection version information returned by a Depth 0 PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionTag {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctag: Option<String>,
}

/// Parses a multistatus document into its responses, in document order.
///
/// # Errors
///
/// Returns [`CalDavError::XmlParse`] if the document is not well-formed XML
/// or its root element is not `DAV:multistatus`.
pub fn parse_multistatus(xml: &str) -> CalDavResult<Vec<MultistatusResponse>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::default();

    loop {
        let resolved = reader
            .read_resolved_event()
            .map_err(|e| CalDavError::xml_parse(e.to_string()))?;

        match resolved {
            (ns, Event::Start(e)) => {
                let tag = Tag::classify(&ns, &e);
                state.open(tag)?;
            }
            (ns, Event::Empty(e)) => {
                let tag = Tag::classify(&ns, &e);
                state.open(tag)?;
                state.close()?;
            }
            (_, Event::End(_)) => state.close()?,
            (_, Event::Text(e)) => {
                if state.capturing() {
                    let text = e
                        .unescape()
                        .map_err(|e| CalDavError::xml_parse(format!("invalid text: {}", e)))?;
                    state.push_text(&text);
                }
            }
            (_, Event::CData(e)) => {
                if state.capturing() {
                    state.push_text(&String::from_utf8_lossy(&e));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    state.finish()
}

/// Extracts the qualifying calendar resources from parsed responses.
///
/// The status is taken from the propstat carrying `calendar-data`, falling
/// back to the response-level status. Entries without an href, without data,
/// or with any status other than `HTTP/1.1 200 OK` are dropped.
pub fn calendar_resources(responses: &[MultistatusResponse]) -> Vec<RawCalendarResource> {
    responses
        .iter()
        .filter_map(|response| {
            let href = response.href.as_deref().unwrap_or_default();
            let propstat = response
                .propstats
                .iter()
                .find(|p| p.calendar_data.is_some());
            let status = propstat
                .and_then(|p| p.status.as_deref())
                .or(response.status.as_deref());
            let data = propstat
                .and_then(|p| p.calendar_data.as_deref())
                .unwrap_or_default();

            if href.is_empty() || data.trim().is_empty() || !status_is_ok(status) {
                debug!(href, status = ?status, "Dropping multistatus entry");
                return None;
            }

            Some(RawCalendarResource {
                href: href.to_string(),
                status: STATUS_OK.to_string(),
                data: data.to_string(),
            })
        })
        .collect()
}

/// Parses a REPORT response straight into qualifying calendar resources.
pub fn parse_calendar_resources(xml: &str) -> CalDavResult<Vec<RawCalendarResource>> {
    Ok(calendar_resources(&parse_multistatus(xml)?))
}

/// Extracts the ETag of every resource with a `200 OK` propstat carrying one.
pub fn resource_tags(responses: &[MultistatusResponse]) -> Vec<ResourceTag> {
    responses
        .iter()
        .filter_map(|response| {
            let href = response.href.as_deref().filter(|h| !h.is_empty())?;
            let etag = response
                .propstats
                .iter()
                .filter(|p| p.is_ok())
                .find_map(|p| p.etag.as_deref().filter(|etag| !etag.is_empty()))?;
            Some(ResourceTag {
                href: href.to_string(),
                etag: etag.trim_matches('"').to_string(),
            })
        })
        .collect()
}

/// Extracts the collection tag from a Depth 0 PROPFIND response.
///
/// Returns `None` when no response has a `200 OK` propstat. Properties are
/// merged across every `200 OK` propstat of the first qualifying response,
/// since servers report unknown properties (often `getctag`) in a separate
/// `404` block.
pub fn collection_tag(responses: &[MultistatusResponse]) -> Option<CollectionTag> {
    responses.iter().find_map(|response| {
        let href = response.href.as_deref()?;
        let ok: Vec<&Propstat> = response.propstats.iter().filter(|p| p.is_ok()).collect();
        if ok.is_empty() {
            return None;
        }

        Some(CollectionTag {
            href: href.to_string(),
            display_name: ok.iter().find_map(|p| p.display_name.clone()),
            ctag: ok.iter().find_map(|p| p.ctag.clone()),
        })
    })
}

fn status_is_ok(status: Option<&str>) -> bool {
    status.map(str::trim) == Some(STATUS_OK)
}

/// Elements the parser cares about, by expanded name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Multistatus,
    Response,
    Href,
    Propstat,
    Prop,
    Status,
    GetEtag,
    DisplayName,
    CalendarData,
    GetCtag,
    Other,
}

impl Tag {
    fn classify(ns: &ResolveResult<'_>, element: &BytesStart<'_>) -> Self {
        let ResolveResult::Bound(Namespace(ns)) = ns else {
            return Self::Other;
        };
        let local = element.local_name();

        match (*ns, local.as_ref()) {
            (ns, name) if ns == DAV_NS.as_bytes() => match name {
                b"multistatus" => Self::Multistatus,
                b"response" => Self::Response,
                b"href" => Self::Href,
                b"propstat" => Self::Propstat,
                b"prop" => Self::Prop,
                b"status" => Self::Status,
                b"getetag" => Self::GetEtag,
                b"displayname" => Self::DisplayName,
                _ => Self::Other,
            },
            (ns, b"calendar-data") if ns == CALDAV_NS.as_bytes() => Self::CalendarData,
            (ns, b"getctag") if ns == CS_NS.as_bytes() => Self::GetCtag,
            _ => Self::Other,
        }
    }
}

#[derive(Default)]
struct ParseState {
    stack: Vec<Tag>,
    saw_root: bool,
    response: Option<MultistatusResponse>,
    propstat: Option<Propstat>,
    text: Option<String>,
    responses: Vec<MultistatusResponse>,
}

impl ParseState {
    /// Returns the tag `depth` levels above the top of the stack.
    fn ancestor(&self, depth: usize) -> Option<Tag> {
        self.stack.iter().rev().nth(depth).copied()
    }

    /// Whether the element just opened (top of stack) holds a wanted value.
    fn is_value_position(&self) -> bool {
        match self.ancestor(0) {
            Some(Tag::Href) => self.ancestor(1) == Some(Tag::Response),
            Some(Tag::Status) => matches!(self.ancestor(1), Some(Tag::Response | Tag::Propstat)),
            Some(Tag::GetEtag | Tag::DisplayName | Tag::CalendarData | Tag::GetCtag) => {
                self.ancestor(1) == Some(Tag::Prop) && self.ancestor(2) == Some(Tag::Propstat)
            }
            _ => false,
        }
    }

    fn open(&mut self, tag: Tag) -> CalDavResult<()> {
        if self.stack.is_empty() {
            if self.saw_root {
                return Err(CalDavError::xml_parse("multiple root elements"));
            }
            if tag != Tag::Multistatus {
                return Err(CalDavError::xml_parse("root element is not DAV:multistatus"));
            }
            self.saw_root = true;
        }

        let parent = self.ancestor(0);
        self.stack.push(tag);

        match (tag, parent) {
            (Tag::Response, Some(Tag::Multistatus)) => {
                self.response = Some(MultistatusResponse::default());
            }
            (Tag::Propstat, Some(Tag::Response)) => {
                self.propstat = Some(Propstat::default());
            }
            _ if self.is_value_position() => self.text = Some(String::new()),
            _ => {}
        }

        Ok(())
    }

    fn capturing(&self) -> bool {
        self.text.is_some()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(buffer) = self.text.as_mut() {
            buffer.push_str(text);
        }
    }

    fn close(&mut self) -> CalDavResult<()> {
        let value_position = self.is_value_position();
        let tag = self
            .stack
            .pop()
            .ok_or_else(|| CalDavError::xml_parse("unbalanced end tag"))?;
        let parent = self.ancestor(0);

        if value_position {
            let value = self.text.take().unwrap_or_default();
            self.store(tag, parent, value);
            return Ok(());
        }

        match (tag, parent) {
            (Tag::Propstat, Some(Tag::Response)) => {
                if let (Some(propstat), Some(response)) =
                    (self.propstat.take(), self.response.as_mut())
                {
                    response.propstats.push(propstat);
                }
            }
            (Tag::Response, Some(Tag::Multistatus)) => {
                if let Some(response) = self.response.take() {
                    self.responses.push(response);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn store(&mut self, tag: Tag, parent: Option<Tag>, value: String) {
        match (tag, parent) {
            (Tag::Href, _) => {
                if let Some(response) = self.response.as_mut() {
                    if response.href.is_none() {
                        response.href = Some(value);
                    }
                }
            }
            (Tag::Status, Some(Tag::Response)) => {
                if let Some(response) = self.response.as_mut() {
                    response.status = Some(value);
                }
            }
            (Tag::Status, _) => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.status = Some(value);
                }
            }
            (tag, _) => {
                let Some(propstat) = self.propstat.as_mut() else {
                    return;
                };
                match tag {
                    Tag::CalendarData => propstat.calendar_data = Some(value),
                    Tag::GetEtag => propstat.etag = Some(value),
                    Tag::DisplayName => propstat.display_name = Some(value),
                    Tag::GetCtag => propstat.ctag = Some(value),
                    _ => {}
                }
            }
        }
    }

    fn finish(self) -> CalDavResult<Vec<MultistatusResponse>> {
        if !self.saw_root {
            return Err(CalDavError::xml_parse("missing DAV:multistatus root element"));
        }
        if !self.stack.is_empty() {
            return Err(CalDavError::xml_parse("unexpected end of document"));
        }
        Ok(self.responses)
    }
}
