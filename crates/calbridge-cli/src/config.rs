//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calbridge/config.toml` by default:
//!
//! ```toml
//! [caldav]
//! url = "https://dav.example.com/calendars/alice/work/"
//! username = "alice"
//! password = "pass::dav/alice"
//! timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "json"
//! # filter = "calbridge_caldav=trace"
//! ```
//!
//! `password` and `token` support secret references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;

use calbridge_caldav::{CalDavConfig, Credential};
use calbridge_core::{TracingConfig, TracingOutputFormat};

/// Configuration for the calbridge client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Calendar collection settings.
    pub caldav: Option<CalDavSettings>,

    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Connection settings for one calendar collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavSettings {
    /// Calendar collection URL.
    pub url: String,

    /// Username for Basic authentication.
    pub username: Option<String>,

    /// Password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// Pre-encoded Basic token, used instead of username/password
    /// (supports `pass::` and `env::` prefixes).
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// User agent override.
    pub user_agent: Option<String>,
}

impl Default for CalDavSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: None,
            password: None,
            token: None,
            timeout_secs: CalDavConfig::DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
            user_agent: None,
        }
    }
}

impl CalDavSettings {
    /// Resolves secrets and builds the library configuration.
    pub fn to_caldav_config(&self) -> Result<CalDavConfig, String> {
        if self.url.trim().is_empty() {
            return Err(format!(
                "CalDAV url is missing. Add to {}:\n  \
                 [caldav]\n  \
                 url = \"https://dav.example.com/calendars/you/personal/\"",
                ClientConfig::default_path().display()
            ));
        }

        let credential = self.resolve_credential()?;
        let mut config =
            CalDavConfig::new(self.url.trim(), credential).map_err(|e| e.to_string())?;

        config = config.with_timeout(Duration::from_secs(self.timeout_secs));
        if !self.verify_tls {
            config = config.with_insecure_tls();
        }
        if let Some(ref user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }

        Ok(config)
    }

    /// Resolves the credential: `token` wins over `username`/`password`.
    pub(crate) fn resolve_credential(&self) -> Result<Credential, String> {
        if let Some(ref token) = self.token {
            let token = crate::secret::resolve_field("token", token)?;
            return Ok(Credential::token(token));
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                let password = crate::secret::resolve_field("password", password)?;
                Ok(Credential::basic(username, password))
            }
            (Some(_), None) => Err("password is missing from [caldav] section".to_string()),
            _ => Err("[caldav] needs either token or username and password".to_string()),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    pub level: String,

    /// Output format: `pretty`, `compact` or `json`.
    pub format: String,

    /// Full filter directive, e.g. `calbridge_caldav=trace`. Beats `RUST_LOG`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            filter: None,
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing configuration. `debug` forces the debug preset.
    pub fn to_tracing_config(&self, debug: bool) -> Result<TracingConfig, String> {
        let format = TracingOutputFormat::from_str(&self.format).map_err(|e| e.to_string())?;

        let base = if debug {
            TracingConfig::cli_debug()
        } else {
            let level = Level::from_str(&self.level)
                .map_err(|_| format!("unknown log level {:?}", self.level))?;
            TracingConfig::cli().with_level(level)
        };
        let mut config = base.with_format(format);

        if let Some(ref filter) = self.filter {
            config = config.with_env_filter(filter);
            config.filter().map_err(|e| e.to_string())?;
        }
        Ok(config)
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the CalDAV settings, with the collection URL overridden if given.
    pub fn caldav_settings(&self, url_override: Option<&str>) -> Result<CalDavSettings, String> {
        let mut settings = self.caldav.clone().ok_or_else(|| {
            format!(
                "no [caldav] section in {}",
                Self::default_path().display()
            )
        })?;
        if let Some(url) = url_override {
            settings.url = url.to_string();
        }
        Ok(settings)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbridge")
    }
}
