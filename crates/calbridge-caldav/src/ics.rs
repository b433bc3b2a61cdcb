//! iCalendar normalization.
//!
//! Decodes the `calendar-data` of a resource into [`Event`] records and
//! renders the minimal VCALENDAR used by the write path.

use chrono::{DateTime, Duration, Utc};
use icalendar::parser;
use icalendar::{Calendar, Component, EventLike, Property};
use tracing::{debug, warn};

use calbridge_core::{
    Event, EventTime, Frequency, ParticipationStatus, Person, RecurrenceRule, TimeError,
    parse_ical_datetime, parse_ical_duration,
};

use crate::error::{CalDavError, CalDavResult};

/// Decodes one iCalendar blob into one event per VEVENT it contains.
///
/// # Errors
///
/// Returns [`CalDavError::ICalParse`] if the text is not a VCALENDAR, fails
/// to parse, or holds a VEVENT whose dates cannot be decoded.
pub fn parse_calendar_data(data: &str) -> CalDavResult<Vec<Event>> {
    let data = data.trim();
    let is_vcalendar = data
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !is_vcalendar {
        return Err(CalDavError::ical_parse("data does not start with BEGIN:VCALENDAR"));
    }

    // Multistatus text is trimmed, so the last line may lack its terminator.
    let mut unfolded = parser::unfold(data);
    unfolded.push_str("\r\n");
    let calendar = parser::read_calendar(&unfolded).map_err(CalDavError::ical_parse)?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    vevents.into_iter().map(decode_event).collect()
}

/// Renders a minimal VCALENDAR/VEVENT for `event`.
///
/// Carries UID, DTSTAMP, SUMMARY, DTSTART, DTEND and ORGANIZER. Attendees,
/// recurrence, description and location are not written.
pub fn write_minimal_event(event: &Event) -> String {
    let mut vevent = icalendar::Event::new();
    vevent
        .uid(&event.id)
        .timestamp(Utc::now())
        .summary(&event.name)
        .starts(event.start)
        .ends(event.end);

    if let Some(organizer) = &event.organizer {
        let mailto = format!("mailto:{}", organizer.mail);
        vevent.append_property(
            Property::new("ORGANIZER", &mailto)
                .add_parameter("CN", &organizer.name)
                .done(),
        );
    }

    Calendar::new().push(vevent.done()).done().to_string()
}

fn collect_vevents<'c, 'a>(
    components: &'c [parser::Component<'a>],
    out: &mut Vec<&'c parser::Component<'a>>,
) {
    for component in components {
        if component.name.as_str().eq_ignore_ascii_case("VEVENT") {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

fn decode_event(component: &parser::Component<'_>) -> CalDavResult<Event> {
    let props = component.properties.as_slice();

    let id = match property(props, "UID") {
        Some(uid) => uid.val.as_str().trim().to_string(),
        None => {
            warn!("VEVENT without UID, emitting it with an empty id");
            String::new()
        }
    };

    let ical_err = |field: &str, e: TimeError| {
        CalDavError::ical_parse(format!("event {:?}: invalid {}: {}", id, field, e))
    };

    let dtstart = property(props, "DTSTART")
        .ok_or_else(|| CalDavError::ical_parse(format!("event {:?} has no DTSTART", id)))?;
    let start_time = decode_time(dtstart).map_err(|e| ical_err("DTSTART", e))?;
    let start = start_time.to_utc_datetime();

    let end = match (property(props, "DTEND"), property(props, "DURATION")) {
        (Some(dtend), _) => decode_time(dtend)
            .map_err(|e| ical_err("DTEND", e))?
            .to_utc_datetime(),
        (None, Some(duration)) => {
            let duration =
                parse_ical_duration(duration.val.as_str()).map_err(|e| ical_err("DURATION", e))?;
            start.checked_add_signed(duration).ok_or_else(|| {
                CalDavError::ical_parse(format!("event {:?}: DURATION ends out of range", id))
            })?
        }
        (None, None) if start_time.is_all_day() => start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| CalDavError::ical_parse(format!("event {:?}: DTSTART out of range", id)))?,
        (None, None) => start,
    };

    let name = text_value(props, "SUMMARY").unwrap_or_default();
    let mut event = Event::new(id, name, start, end);

    if let Some(description) = text_value(props, "DESCRIPTION") {
        event = event.with_description(description);
    }
    if let Some(location) = text_value(props, "LOCATION") {
        event = event.with_location(location);
    }

    if let Some(organizer) = property(props, "ORGANIZER") {
        event.organizer = decode_person(organizer);
    }

    for attendee in props.iter().filter(|p| is_named(p, "ATTENDEE")) {
        match decode_person(attendee) {
            Some(person) => event.attendees.push(person),
            None => debug!(uid = %event.id, value = attendee.val.as_str(), "Skipping attendee"),
        }
    }

    if let Some(rrule) = property(props, "RRULE") {
        event.repeat = decode_rrule(rrule.val.as_str(), start);
    }

    debug!(
        uid = %event.id,
        summary = %event.name,
        start = %event.start,
        attendees = event.attendees.len(),
        recurring = event.is_recurring(),
        "Parsed event from ICS"
    );

    Ok(event)
}

fn is_named(prop: &parser::Property<'_>, name: &str) -> bool {
    prop.name.as_str().eq_ignore_ascii_case(name)
}

fn property<'c, 'a>(
    props: &'c [parser::Property<'a>],
    name: &str,
) -> Option<&'c parser::Property<'a>> {
    props.iter().find(|p| is_named(p, name))
}

/// Returns a parameter value with surrounding quotes removed.
fn param<'c>(prop: &'c parser::Property<'_>, key: &str) -> Option<&'c str> {
    prop.params
        .iter()
        .find(|p| p.key.as_str().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_str().trim().trim_matches('"'))
}

fn text_value(props: &[parser::Property<'_>], name: &str) -> Option<String> {
    property(props, name).map(|p| unescape_text(p.val.as_str()))
}

fn decode_time(prop: &parser::Property<'_>) -> Result<EventTime, TimeError> {
    let value = prop.val.as_str().trim();
    let is_date = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));
    if is_date {
        // Some producers append a time to VALUE=DATE; only the date counts.
        let date = value.get(..8).unwrap_or(value);
        return parse_ical_datetime(date, None);
    }
    parse_ical_datetime(value, param(prop, "TZID"))
}

/// Decodes an ORGANIZER or ATTENDEE. Both `CN` and an address are required.
fn decode_person(prop: &parser::Property<'_>) -> Option<Person> {
    let name = param(prop, "CN").filter(|cn| !cn.is_empty())?;
    let mail = strip_mailto(prop.val.as_str().trim());
    if mail.is_empty() {
        return None;
    }

    let mut person = Person::new(unescape_text(name), mail);
    if let Some(status) = param(prop, "PARTSTAT").and_then(ParticipationStatus::from_param) {
        person = person.with_status(status);
    }
    Some(person)
}

fn strip_mailto(value: &str) -> &str {
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &value[7..],
        _ => value,
    }
}

fn decode_rrule(value: &str, start: DateTime<Utc>) -> Option<RecurrenceRule> {
    let mut freq = None;
    let mut end = None;
    let mut interval = None;
    let mut count = None;

    for part in value.split(';') {
        let Some((key, val)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => match val.parse::<Frequency>() {
                Ok(f) => freq = Some(f),
                Err(e) => {
                    warn!(rrule = value, error = %e, "Ignoring RRULE");
                    return None;
                }
            },
            "UNTIL" => match parse_ical_datetime(val.trim(), None) {
                Ok(until) => end = Some(until.to_utc_datetime()),
                Err(e) => warn!(rrule = value, error = %e, "Ignoring invalid UNTIL"),
            },
            "INTERVAL" => interval = val.trim().parse().ok(),
            "COUNT" => count = val.trim().parse().ok(),
            _ => {}
        }
    }

    let Some(freq) = freq else {
        warn!(rrule = value, "RRULE without FREQ");
        return None;
    };

    Some(RecurrenceRule {
        start,
        end,
        freq,
        interval,
        count,
    })
}

/// Reverses iCalendar TEXT escaping (RFC 5545 3.3.11).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped @ ('\\' | ';' | ',')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::TimeZone;

    fn ics(lines: &[&str]) -> String {
        let mut text = lines.join("\r\n");
        text.push_str("\r\n");
        text
    }

    fn vevent(body: &[&str]) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "PRODID:-//Example//Test//EN",
            "BEGIN:VEVENT",
        ];
        lines.extend_from_slice(body);
        lines.extend_from_slice(&["END:VEVENT", "END:VCALENDAR"]);
        ics(&lines)
    }

    fn single(body: &[&str]) -> Event {
        let mut events = parse_calendar_data(&vevent(body)).unwrap();
        assert_eq!(events.len(), 1);
        events.remove(0)
    }

    #[test]
    fn parse_basic_event() {
        let event = single(&[
            "UID:event1@example.com",
            "DTSTAMP:20250201T000000Z",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "SUMMARY:Team Meeting",
        ]);

        assert_eq!(event.id, "event1@example.com");
        assert_eq!(event.name, "Team Meeting");
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 2, 5, 11, 0, 0).unwrap());
        assert_eq!(event.organizer, None);
        assert!(event.attendees.is_empty());
        assert_eq!(event.repeat, None);
    }

    #[test]
    fn organizer_with_cn_and_mailto() {
        let event = single(&[
            "UID:org",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "SUMMARY:Planning",
            "ORGANIZER;CN=Alice:mailto:alice@example.com",
        ]);

        assert_eq!(
            event.organizer,
            Some(Person::new("Alice", "alice@example.com"))
        );
    }

    #[test]
    fn organizer_without_cn_is_absent() {
        let event = single(&[
            "UID:org",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "ORGANIZER:mailto:alice@example.com",
        ]);
        assert_eq!(event.organizer, None);
    }

    #[test]
    fn person_without_address_is_absent() {
        let event = single(&[
            "UID:noaddr",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "ORGANIZER;CN=Alice:mailto:",
            "ATTENDEE;CN=Dave:MAILTO:",
            "ATTENDEE;CN=Erin:mailto:erin@example.com",
        ]);
        assert_eq!(event.organizer, None);
        assert_eq!(event.attendees, vec![Person::new("Erin", "erin@example.com")]);
    }

    #[test]
    fn attendees_keep_partstat_and_skip_undecodable() {
        let event = single(&[
            "UID:att",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "ATTENDEE;CN=Bob;PARTSTAT=ACCEPTED:mailto:bob@example.com",
            "ATTENDEE:mailto:nocn@example.com",
            "ATTENDEE;CN=Carol;PARTSTAT=TENTATIVE:MAILTO:carol@example.com",
        ]);

        assert_eq!(
            event.attendees,
            vec![
                Person::new("Bob", "bob@example.com").with_status(ParticipationStatus::Accepted),
                Person::new("Carol", "carol@example.com")
                    .with_status(ParticipationStatus::Tentative),
            ]
        );
    }

    #[test]
    fn rrule_is_reduced() {
        let event = single(&[
            "UID:weekly",
            "DTSTART:20250106T090000Z",
            "DTEND:20250106T093000Z",
            "SUMMARY:Standup",
            "RRULE:FREQ=WEEKLY;INTERVAL=2;UNTIL=20250331T000000Z",
        ]);

        let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        assert_eq!(
            event.repeat,
            Some(RecurrenceRule {
                start,
                end: Some(Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap()),
                freq: Frequency::Weekly,
                interval: Some(2),
                count: None,
            })
        );
    }

    #[test]
    fn rrule_with_count_and_unknown_freq() {
        let counted = single(&[
            "UID:daily",
            "DTSTART:20250106T090000Z",
            "DTEND:20250106T093000Z",
            "RRULE:FREQ=DAILY;COUNT=10",
        ]);
        let repeat = counted.repeat.unwrap();
        assert_eq!(repeat.freq, Frequency::Daily);
        assert_eq!(repeat.count, Some(10));
        assert_eq!(repeat.end, None);

        let bogus = single(&[
            "UID:bogus",
            "DTSTART:20250106T090000Z",
            "DTEND:20250106T093000Z",
            "RRULE:FREQ=FORTNIGHTLY",
        ]);
        assert_eq!(bogus.repeat, None);
    }

    #[test]
    fn all_day_event_without_dtend_lasts_one_day() {
        let event = single(&["UID:holiday", "DTSTART;VALUE=DATE:20250214", "SUMMARY:Holiday"]);

        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 2, 14, 0, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 2, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn duration_fills_missing_dtend() {
        let event = single(&["UID:dur", "DTSTART:20250205T100000Z", "DURATION:PT1H30M"]);
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 2, 5, 11, 30, 0).unwrap());

        let instant = single(&["UID:instant", "DTSTART:20250205T100000Z"]);
        assert_eq!(instant.end, instant.start);
    }

    #[test]
    fn tzid_is_resolved() {
        let event = single(&[
            "UID:paris",
            "DTSTART;TZID=Europe/Paris:20250701T100000",
            "DTEND;TZID=Europe/Paris:20250701T110000",
        ]);

        // CEST is UTC+2 in July.
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn text_fields_are_unescaped() {
        let event = single(&[
            "UID:text",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            r"SUMMARY:Lunch\, then review\; maybe",
            r"DESCRIPTION:Line one\nLine two",
            r"LOCATION:Room 4\\B",
        ]);

        assert_eq!(event.name, "Lunch, then review; maybe");
        assert_eq!(event.description.as_deref(), Some("Line one\nLine two"));
        assert_eq!(event.location.as_deref(), Some(r"Room 4\B"));
    }

    #[test]
    fn missing_uid_yields_empty_id() {
        let event = single(&["DTSTART:20250205T100000Z", "DTEND:20250205T110000Z"]);
        assert_eq!(event.id, "");
    }

    #[test]
    fn multiple_vevents() {
        let data = ics(&[
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "BEGIN:VEVENT",
            "UID:first",
            "DTSTART:20250205T100000Z",
            "DTEND:20250205T110000Z",
            "END:VEVENT",
            "BEGIN:VEVENT",
            "UID:second",
            "DTSTART:20250206T100000Z",
            "DTEND:20250206T110000Z",
            "END:VEVENT",
            "END:VCALENDAR",
        ]);

        let ids: Vec<String> = parse_calendar_data(&data)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn duration_past_the_calendar_range_is_an_ical_error() {
        let err = parse_calendar_data(&vevent(&[
            "UID:far",
            "DTSTART:20250205T100000Z",
            "DURATION:P999999999D",
        ]))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ICalParse);
        assert!(err.to_string().contains("far"));

        let err = parse_calendar_data(&vevent(&[
            "UID:huge",
            "DTSTART:20250205T100000Z",
            "DURATION:P99999999999W",
        ]))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ICalParse);
    }

    #[test]
    fn invalid_data_is_an_ical_error() {
        let err = parse_calendar_data("not a calendar").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ICalParse);

        let err = parse_calendar_data("").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ICalParse);
    }

    #[test]
    fn missing_dtstart_is_an_ical_error() {
        let err = parse_calendar_data(&vevent(&["UID:nostart", "SUMMARY:Nothing"])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ICalParse);
        assert!(err.to_string().contains("nostart"));
    }

    #[test]
    fn minimal_writer_output() {
        let event = Event::new(
            "write-1@example.com",
            "Design review",
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
        )
        .with_organizer(Person::new("Alice", "alice@example.com"))
        .with_attendee(Person::new("Bob", "bob@example.com"));

        let text = write_minimal_event(&event);

        assert!(text.starts_with("BEGIN:VCALENDAR"));
        assert!(text.contains("BEGIN:VEVENT"));
        assert!(text.contains("UID:write-1@example.com"));
        assert!(text.contains("SUMMARY:Design review"));
        assert!(text.contains("DTSTART:20250310T140000Z"));
        assert!(text.contains("DTEND:20250310T150000Z"));
        assert!(text.contains("ORGANIZER;CN=Alice:mailto:alice@example.com"));
        assert!(text.contains("DTSTAMP:"));
        assert!(!text.contains("ATTENDEE"));
        assert!(!text.contains("RRULE"));
    }

    #[test]
    fn minimal_writer_output_reads_back() {
        let event = Event::new(
            "loop@example.com",
            "Sync",
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 30, 0).unwrap(),
        );

        let parsed = parse_calendar_data(&write_minimal_event(&event)).unwrap();
        assert_eq!(parsed, vec![event]);
    }
}
