//! CalDAV request bodies.
//!
//! Pure functions producing the XML documents sent with REPORT and PROPFIND.
//! All interpolated values (UIDs, hrefs, instants) go through the XML writer,
//! so element text and attribute values are always escaped.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use calbridge_core::{TimeRange, format_caldav_utc};

use crate::error::{CalDavError, CalDavResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// CalendarServer namespace (getctag)
pub const CS_NS: &str = "http://calendarserver.org/ns/";

/// Builds the `calendar-query` matching a single VEVENT by UID.
pub fn calendar_query_by_uid(uid: &str) -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.open_calendar_query()?;
    xml.event_props(true)?;

    xml.start("c:filter", &[])?;
    xml.start("c:comp-filter", &[("name", "VCALENDAR")])?;
    xml.start("c:comp-filter", &[("name", "VEVENT")])?;
    xml.start("c:prop-filter", &[("name", "UID")])?;
    xml.text_element("c:text-match", &[("collation", "i;octet")], uid)?;
    xml.end("c:prop-filter")?;
    xml.end("c:comp-filter")?;
    xml.end("c:comp-filter")?;
    xml.end("c:filter")?;

    xml.end("c:calendar-query")?;
    xml.finish()
}

/// Builds the `calendar-query` listing every VEVENT in the collection.
pub fn calendar_query_all() -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.open_calendar_query()?;
    xml.event_props(true)?;
    xml.vevent_filter(None)?;
    xml.end("c:calendar-query")?;
    xml.finish()
}

/// Builds the `calendar-query` listing VEVENTs overlapping `range`.
///
/// The `time-range` element carries `end` only when the range is bounded.
pub fn calendar_query_between(range: &TimeRange) -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.open_calendar_query()?;
    xml.event_props(true)?;
    xml.vevent_filter(Some(range))?;
    xml.end("c:calendar-query")?;
    xml.finish()
}

/// Builds the `calendar-query` requesting only the ETag of every VEVENT.
pub fn calendar_query_etags() -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.open_calendar_query()?;
    xml.event_props(false)?;
    xml.vevent_filter(None)?;
    xml.end("c:calendar-query")?;
    xml.finish()
}

/// Builds a `calendar-multiget` fetching the given resource hrefs.
pub fn calendar_multiget<S: AsRef<str>>(hrefs: &[S]) -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.start(
        "c:calendar-multiget",
        &[("xmlns:d", DAV_NS), ("xmlns:c", CALDAV_NS)],
    )?;
    xml.event_props(true)?;
    for href in hrefs {
        xml.text_element("d:href", &[], href.as_ref())?;
    }
    xml.end("c:calendar-multiget")?;
    xml.finish()
}

/// Builds the Depth 0 `propfind` for the collection's display name and ctag.
pub fn propfind_ctag() -> CalDavResult<String> {
    let mut xml = QueryWriter::new()?;
    xml.start("d:propfind", &[("xmlns:d", DAV_NS), ("xmlns:cs", CS_NS)])?;
    xml.start("d:prop", &[])?;
    xml.empty("d:displayname", &[])?;
    xml.empty("cs:getctag", &[])?;
    xml.end("d:prop")?;
    xml.end("d:propfind")?;
    xml.finish()
}

/// Thin wrapper over the quick-xml writer that turns write failures into
/// [`CalDavError::Internal`].
struct QueryWriter {
    writer: Writer<Vec<u8>>,
}

impl QueryWriter {
    fn new() -> CalDavResult<Self> {
        let mut xml = Self {
            writer: Writer::new(Vec::new()),
        };
        xml.write(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(xml)
    }

    fn write(&mut self, event: Event<'_>) -> CalDavResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| CalDavError::internal(format!("failed to write XML: {}", e)))
    }

    fn element<'a>(name: &'a str, attributes: &[(&str, &str)]) -> BytesStart<'a> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        element
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> CalDavResult<()> {
        self.write(Event::Start(Self::element(name, attributes)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> CalDavResult<()> {
        self.write(Event::Empty(Self::element(name, attributes)))
    }

    fn end(&mut self, name: &str) -> CalDavResult<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> CalDavResult<()> {
        self.start(name, attributes)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// `<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">`
    fn open_calendar_query(&mut self) -> CalDavResult<()> {
        self.start(
            "c:calendar-query",
            &[("xmlns:d", DAV_NS), ("xmlns:c", CALDAV_NS)],
        )
    }

    /// `<d:prop>` with getetag and, optionally, calendar-data.
    fn event_props(&mut self, with_data: bool) -> CalDavResult<()> {
        self.start("d:prop", &[])?;
        self.empty("d:getetag", &[])?;
        if with_data {
            self.empty("c:calendar-data", &[])?;
        }
        self.end("d:prop")
    }

    /// `<c:filter>` selecting VEVENTs inside the VCALENDAR, optionally by time.
    fn vevent_filter(&mut self, range: Option<&TimeRange>) -> CalDavResult<()> {
        self.start("c:filter", &[])?;
        self.start("c:comp-filter", &[("name", "VCALENDAR")])?;

        match range {
            Some(range) => {
                self.start("c:comp-filter", &[("name", "VEVENT")])?;
                let start = format_caldav_utc(&range.start);
                let end = range.end.as_ref().map(format_caldav_utc);
                let mut attributes = vec![("start", start.as_str())];
                if let Some(ref end) = end {
                    attributes.push(("end", end.as_str()));
                }
                self.empty("c:time-range", &attributes)?;
                self.end("c:comp-filter")?;
            }
            None => self.empty("c:comp-filter", &[("name", "VEVENT")])?,
        }

        self.end("c:comp-filter")?;
        self.end("c:filter")
    }

    fn finish(self) -> CalDavResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| CalDavError::internal(format!("XML body is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn uid_query_body() {
        let body = calendar_query_by_uid("event-42@example.com").unwrap();
        insta::assert_snapshot!(body, @r#"<?xml version="1.0" encoding="utf-8"?><c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav"><d:prop><d:getetag/><c:calendar-data/></d:prop><c:filter><c:comp-filter name="VCALENDAR"><c:comp-filter name="VEVENT"><c:prop-filter name="UID"><c:text-match collation="i;octet">event-42@example.com</c:text-match></c:prop-filter></c:comp-filter></c:comp-filter></c:filter></c:calendar-query>"#);
    }

    #[test]
    fn uid_is_escaped() {
        let body = calendar_query_by_uid("a<b&c").unwrap();
        assert!(body.contains(">a&lt;b&amp;c</c:text-match>"));
        assert!(!body.contains("a<b"));
    }

    #[test]
    fn list_all_body_has_bare_vevent_filter() {
        let body = calendar_query_all().unwrap();
        assert!(body.contains(
            r#"<c:comp-filter name="VCALENDAR"><c:comp-filter name="VEVENT"/></c:comp-filter>"#
        ));
        assert!(body.contains("<c:calendar-data/>"));
        assert!(!body.contains("time-range"));
        assert!(!body.contains("prop-filter"));
    }

    #[test]
    fn time_range_body_renders_basic_utc() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let range = TimeRange::between(start, end).unwrap();

        let body = calendar_query_between(&range).unwrap();
        assert!(body.contains(r#"<c:time-range start="20240101T000000Z" end="20240131T235959Z"/>"#));
    }

    #[test]
    fn open_ended_time_range_omits_end() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let body = calendar_query_between(&TimeRange::starting(start)).unwrap();

        assert!(body.contains(r#"<c:time-range start="20240601T083000Z"/>"#));
        assert!(!body.contains("end="));
    }

    #[test]
    fn multiget_lists_every_href() {
        let body = calendar_multiget(&["/cal/event1.ics", "/cal/a&b.ics"]).unwrap();

        assert!(body.contains("<c:calendar-multiget"));
        assert!(body.contains("<d:href>/cal/event1.ics</d:href>"));
        assert!(body.contains("<d:href>/cal/a&amp;b.ics</d:href>"));
        assert!(body.contains("<c:calendar-data/>"));
    }

    #[test]
    fn etag_query_omits_calendar_data() {
        let body = calendar_query_etags().unwrap();
        assert!(body.contains("<d:prop><d:getetag/></d:prop>"));
        assert!(!body.contains("calendar-data"));
        assert!(body.contains(r#"<c:comp-filter name="VEVENT"/>"#));
    }

    #[test]
    fn ctag_propfind_body() {
        let body = propfind_ctag().unwrap();
        assert!(body.contains(r#"<d:propfind xmlns:d="DAV:" xmlns:cs="http://calendarserver.org/ns/">"#));
        assert!(body.contains("<d:prop><d:displayname/><cs:getctag/></d:prop>"));
    }
}
