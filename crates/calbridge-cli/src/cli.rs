//! Command-line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// calbridge - CalDAV calendar access from the command line
#[derive(Debug, Parser)]
#[command(name = "calbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Calendar collection URL (overrides the configured one)
    #[arg(long, env = "CALBRIDGE_URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one event by UID
    Get {
        /// Event UID
        uid: String,
    },

    /// List every event in the collection
    List,

    /// List events overlapping a time range
    Between {
        /// Range start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Range end (RFC 3339); open-ended when omitted
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Fetch several resources by href in one request
    Multiget {
        /// Resource hrefs
        #[arg(required = true)]
        hrefs: Vec<String>,
    },

    /// Show the collection's display name and ctag
    Ctag,

    /// List the ETag of every event
    Etags,

    /// Create or replace an event from fields
    Put {
        /// Event UID
        #[arg(long)]
        uid: String,

        /// Event title
        #[arg(long)]
        summary: String,

        /// Start instant (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End instant (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Organizer display name
        #[arg(long, requires = "organizer_mail")]
        organizer_name: Option<String>,

        /// Organizer mail address
        #[arg(long, requires = "organizer_name")]
        organizer_mail: Option<String>,
    },

    /// Store a complete iCalendar file as an event
    PutIcs {
        /// Event UID (names the `<uid>.ics` resource)
        #[arg(long)]
        uid: String,

        /// Path to the .ics file
        file: PathBuf,
    },

    /// Delete an event by UID
    Delete {
        /// Event UID
        uid: String,
    },

    /// Print the raw iCalendar text of an event
    Source {
        /// Event UID
        uid: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_between_with_open_end() {
        let cli = Cli::try_parse_from([
            "calbridge",
            "--url",
            "https://dav.example.com/cal/",
            "between",
            "--start",
            "2024-01-01T00:00:00Z",
        ])
        .unwrap();

        assert_eq!(cli.url.as_deref(), Some("https://dav.example.com/cal/"));
        match cli.command {
            Command::Between { start, end } => {
                assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
                assert_eq!(end, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn organizer_flags_go_together() {
        let result = Cli::try_parse_from([
            "calbridge",
            "put",
            "--uid",
            "a",
            "--summary",
            "b",
            "--start",
            "2024-01-01T10:00:00Z",
            "--end",
            "2024-01-01T11:00:00Z",
            "--organizer-name",
            "Alice",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn multiget_requires_hrefs() {
        assert!(Cli::try_parse_from(["calbridge", "multiget"]).is_err());
        let cli = Cli::try_parse_from(["calbridge", "multiget", "/a.ics", "/b.ics"]).unwrap();
        assert!(matches!(cli.command, Command::Multiget { ref hrefs } if hrefs.len() == 2));
    }
}
