//! Event commands: each one runs a single facade operation and renders the
//! result for stdout.

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use calbridge_caldav::ics::parse_calendar_data;
use calbridge_caldav::{CalDavClient, Transport};
use calbridge_core::{Event, Person, TimeRange};

use crate::cli::Command;
use crate::error::{ClientError, ClientResult};

/// Runs an event command and returns the text to print.
///
/// Structured results are pretty-printed JSON; `source` prints the raw
/// iCalendar text.
pub async fn execute<T: Transport>(
    client: &CalDavClient<T>,
    command: Command,
) -> ClientResult<String> {
    match command {
        Command::Get { uid } => render(&client.get_event_by_uid(&uid).await?),
        Command::List => render(&client.get_events().await?),
        Command::Between { start, end } => {
            let range = TimeRange::new(start, end)?;
            render(&client.get_events_between(&range).await?)
        }
        Command::Multiget { hrefs } => render(&client.multiget_events(hrefs.as_slice()).await?),
        Command::Ctag => render(&client.get_ctag().await?),
        Command::Etags => render(&client.get_etags().await?),
        Command::Put {
            uid,
            summary,
            start,
            end,
            organizer_name,
            organizer_mail,
        } => {
            if end < start {
                return Err(ClientError::Input(format!(
                    "end {} is before start {}",
                    end, start
                )));
            }
            let mut event = Event::new(uid, summary, start, end);
            if let (Some(name), Some(mail)) = (organizer_name, organizer_mail) {
                event = event.with_organizer(Person::new(name, mail));
            }
            let outcome = client.create_update_event(&event).await?;
            render(&json!({ "uid": event.id, "outcome": outcome }))
        }
        Command::PutIcs { uid, file } => {
            let ics = std::fs::read_to_string(&file)?;
            check_ics(&uid, &ics)?;
            let outcome = client.put_event_ics(&uid, &ics).await?;
            render(&json!({ "uid": uid, "outcome": outcome }))
        }
        Command::Delete { uid } => {
            client.delete_event(&uid).await?;
            render(&json!({ "uid": uid, "deleted": true }))
        }
        Command::Source { uid } => client.get_event_source(&uid).await.map_err(Into::into),
        Command::Config { .. } => Err(ClientError::Input(
            "config commands do not talk to the server".to_string(),
        )),
    }
}

fn render<S: Serialize + ?Sized>(value: &S) -> ClientResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| ClientError::Io(e.into()))
}

/// Rejects files that are not iCalendar before they reach the server.
fn check_ics(uid: &str, ics: &str) -> ClientResult<()> {
    let events = parse_calendar_data(ics)
        .map_err(|e| ClientError::Input(format!("not a valid iCalendar file: {}", e)))?;
    if events.is_empty() {
        return Err(ClientError::Input("iCalendar file holds no VEVENT".to_string()));
    }
    if !events.iter().any(|e| e.id == uid) {
        warn!(uid, "No VEVENT in the file carries the given UID");
    }
    Ok(())
}
