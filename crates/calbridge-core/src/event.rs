//! Event types decoded from CalDAV resources.
//!
//! This module provides the stable public shape returned to callers:
//! - [`Event`]: one VEVENT, reconstructed fresh on every fetch
//! - [`Person`]: an organizer or attendee
//! - [`RecurrenceRule`]: the raw RRULE reduced to its range and frequency
//! - [`ParticipationStatus`]: an attendee's PARTSTAT

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An attendee's participation status (iCalendar `PARTSTAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    /// The attendee has not responded.
    NeedsAction,
    /// The attendee has accepted the invitation.
    Accepted,
    /// The attendee has declined the invitation.
    Declined,
    /// The attendee has tentatively accepted.
    Tentative,
    /// The attendee delegated participation.
    Delegated,
}

impl ParticipationStatus {
    /// Decodes a `PARTSTAT` parameter value (case-insensitive).
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEEDS-ACTION" => Some(Self::NeedsAction),
            "ACCEPTED" => Some(Self::Accepted),
            "DECLINED" => Some(Self::Declined),
            "TENTATIVE" => Some(Self::Tentative),
            "DELEGATED" => Some(Self::Delegated),
            _ => None,
        }
    }
}

/// An organizer or attendee of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Display name from the `CN` parameter.
    pub name: String,
    /// Mail address with the `mailto:` scheme removed.
    pub mail: String,
    /// Participation status, for attendees that carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ParticipationStatus>,
}

impl Person {
    /// Creates a person with the given display name and mail address.
    pub fn new(name: impl Into<String>, mail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mail: mail.into(),
            status: None,
        }
    }

    /// Builder method to set the participation status.
    pub fn with_status(mut self, status: ParticipationStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Recurrence frequency (`FREQ` in an RRULE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the RRULE code for this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SECONDLY" => Ok(Self::Secondly),
            "MINUTELY" => Ok(Self::Minutely),
            "HOURLY" => Ok(Self::Hourly),
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(format!("unknown recurrence frequency: {other}")),
        }
    }
}

/// The recurrence of an event, reduced from its RRULE.
///
/// Only the rule itself is kept; occurrences are not expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Start of the recurrence range (the event's DTSTART).
    pub start: DateTime<Utc>,
    /// The `UNTIL` bound, if any.
    pub end: Option<DateTime<Utc>>,
    /// Recurrence frequency.
    pub freq: Frequency,
    /// The `INTERVAL` between occurrences, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    /// The `COUNT` of occurrences, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// A calendar event decoded from one VEVENT.
///
/// Events carry no identity across fetches; every call returns new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The iCalendar UID.
    pub id: String,
    /// The SUMMARY.
    pub name: String,
    /// DTSTART as a UTC instant.
    pub start: DateTime<Utc>,
    /// DTEND as a UTC instant.
    pub end: DateTime<Utc>,
    /// The ORGANIZER, if it carried both a name and a mail address.
    pub organizer: Option<Person>,
    /// Every ATTENDEE that decoded successfully.
    #[serde(rename = "attendee", default)]
    pub attendees: Vec<Person>,
    /// The RRULE, if the event recurs.
    pub repeat: Option<RecurrenceRule>,
    /// The DESCRIPTION, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The LOCATION, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Event {
    /// Creates an event with the required fields.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start,
            end,
            organizer: None,
            attendees: Vec::new(),
            repeat: None,
            description: None,
            location: None,
        }
    }

    /// Builder method to set the organizer.
    pub fn with_organizer(mut self, organizer: Person) -> Self {
        self.organizer = Some(organizer);
        self
    }

    /// Builder method to add an attendee.
    pub fn with_attendee(mut self, attendee: Person) -> Self {
        self.attendees.push(attendee);
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_repeat(mut self, repeat: RecurrenceRule) -> Self {
        self.repeat = Some(repeat);
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Returns true if the event has an RRULE.
    pub fn is_recurring(&self) -> bool {
        self.repeat.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_start() -> DateTime<Utc> {
        "2025-02-05T10:00:00Z".parse().unwrap()
    }

    fn sample_end() -> DateTime<Utc> {
        "2025-02-05T11:00:00Z".parse().unwrap()
    }

    #[test]
    fn event_builder() {
        let event = Event::new("evt-1", "Standup", sample_start(), sample_end())
            .with_organizer(Person::new("Alice", "alice@example.com"))
            .with_attendee(Person::new("Bob", "bob@example.com"))
            .with_location("Room 101");

        assert_eq!(event.id, "evt-1");
        assert_eq!(event.organizer.as_ref().unwrap().name, "Alice");
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.location.as_deref(), Some("Room 101"));
        assert!(!event.is_recurring());
    }

    #[test]
    fn serializes_public_shape() {
        let event = Event::new("evt-1", "Standup", sample_start(), sample_end())
            .with_attendee(Person::new("Bob", "bob@example.com"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "evt-1");
        assert_eq!(json["name"], "Standup");
        assert_eq!(json["start"], "2025-02-05T10:00:00Z");
        assert_eq!(json["end"], "2025-02-05T11:00:00Z");
        assert!(json["organizer"].is_null());
        assert!(json["repeat"].is_null());
        assert_eq!(json["attendee"][0]["mail"], "bob@example.com");
        assert!(json["attendee"][0].get("status").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn recurrence_serializes_frequency_code() {
        let rule = RecurrenceRule {
            start: sample_start(),
            end: None,
            freq: Frequency::Weekly,
            interval: Some(2),
            count: None,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["freq"], "WEEKLY");
        assert!(json["end"].is_null());
        assert_eq!(json["interval"], 2);
    }

    #[test]
    fn frequency_parsing() {
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("YEARLY".parse::<Frequency>().unwrap(), Frequency::Yearly);
        assert!("fortnightly".parse::<Frequency>().is_err());
        assert_eq!(Frequency::Monthly.to_string(), "MONTHLY");
    }

    #[test]
    fn participation_status_from_param() {
        assert_eq!(
            ParticipationStatus::from_param("ACCEPTED"),
            Some(ParticipationStatus::Accepted)
        );
        assert_eq!(
            ParticipationStatus::from_param("needs-action"),
            Some(ParticipationStatus::NeedsAction)
        );
        assert_eq!(ParticipationStatus::from_param("X-MAYBE"), None);
    }
}
