//! Core types: events, attendees, recurrence, CalDAV time handling, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{Event, Frequency, ParticipationStatus, Person, RecurrenceRule};
pub use time::{
    CALDAV_UTC_FORMAT, EventTime, TimeError, TimeRange, format_caldav_utc, parse_ical_datetime,
    parse_ical_duration,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
