//! Credential references in `config.toml`.
//!
//! The `[caldav]` `password` and `token` fields may point outside the file:
//!
//! ```toml
//! password = "pass::dav/alice"   # first line of `pass show dav/alice`
//! token = "env::CALBRIDGE_TOKEN" # value of $CALBRIDGE_TOKEN
//! ```
//!
//! Anything without a known prefix is taken literally. Resolved values are
//! trimmed and must not be empty.

use std::fmt;
use std::process::Command;

/// Where a credential value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// Literal value written in the file.
    Plain(&'a str),
    /// Entry in the `pass` password store.
    Pass(&'a str),
    /// Environment variable.
    Env(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Classifies a raw config value by its prefix.
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path.trim())
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var.trim())
        } else {
            Self::Plain(value)
        }
    }

    /// Fetches the secret and checks it is not blank.
    pub fn resolve(&self) -> Result<String, SecretError> {
        let raw = match *self {
            Self::Plain(value) => value.to_string(),
            Self::Pass(path) => read_pass(path)?,
            Self::Env(var) => {
                std::env::var(var).map_err(|_| SecretError::EnvNotSet(var.to_string()))?
            }
        };

        let value = raw.trim();
        if value.is_empty() {
            return Err(SecretError::Empty(self.to_string()));
        }
        Ok(value.to_string())
    }
}

/// Shown in error messages; never prints a plain secret.
impl fmt::Display for SecretRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => write!(f, "inline value"),
            Self::Pass(path) => write!(f, "pass entry `{}`", path),
            Self::Env(var) => write!(f, "environment variable `{}`", var),
        }
    }
}

/// Failure to turn a reference into a usable secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// `pass` could not be run or exited with an error.
    Pass { path: String, detail: String },
    /// The referenced environment variable is unset.
    EnvNotSet(String),
    /// The secret resolved to an empty or blank string.
    Empty(String),
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass { path, detail } => write!(f, "`pass show {}` failed: {}", path, detail),
            Self::EnvNotSet(var) => write!(f, "environment variable `{}` is not set", var),
            Self::Empty(source) => write!(f, "{} is empty", source),
        }
    }
}

impl std::error::Error for SecretError {}

/// Resolves one `[caldav]` credential field, naming the field on failure.
pub fn resolve_field(field: &str, value: &str) -> Result<String, String> {
    SecretRef::parse(value)
        .resolve()
        .map_err(|e| format!("[caldav] {}: {}", field, e))
}

fn read_pass(path: &str) -> Result<String, SecretError> {
    let failed = |detail: String| SecretError::Pass {
        path: path.to_string(),
        detail,
    };

    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{} ({})", stderr.trim(), output.status)));
    }

    // pass keeps the secret on the first line; the rest is metadata.
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_classified() {
        assert_eq!(SecretRef::parse("hunter2"), SecretRef::Plain("hunter2"));
        assert_eq!(SecretRef::parse("pass::dav/alice"), SecretRef::Pass("dav/alice"));
        assert_eq!(SecretRef::parse("env:: DAV_TOKEN"), SecretRef::Env("DAV_TOKEN"));
        // Only the exact prefix counts.
        assert_eq!(SecretRef::parse("env:X"), SecretRef::Plain("env:X"));
    }

    #[test]
    fn plain_values_are_trimmed() {
        assert_eq!(SecretRef::Plain("  s3cret\n").resolve().unwrap(), "s3cret");
    }

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(
            SecretRef::Plain("   ").resolve().unwrap_err(),
            SecretError::Empty("inline value".to_string())
        );

        unsafe {
            std::env::set_var("_CALBRIDGE_BLANK_SECRET", "");
        }
        let err = resolve_field("token", "env::_CALBRIDGE_BLANK_SECRET").unwrap_err();
        assert_eq!(
            err,
            "[caldav] token: environment variable `_CALBRIDGE_BLANK_SECRET` is empty"
        );
        unsafe {
            std::env::remove_var("_CALBRIDGE_BLANK_SECRET");
        }
    }

    #[test]
    fn env_reference_resolves() {
        unsafe {
            std::env::set_var("_CALBRIDGE_TEST_SECRET", "from-env\n");
        }
        assert_eq!(
            resolve_field("password", "env::_CALBRIDGE_TEST_SECRET").unwrap(),
            "from-env"
        );
        unsafe {
            std::env::remove_var("_CALBRIDGE_TEST_SECRET");
        }
    }

    #[test]
    fn unset_env_names_the_field() {
        let err = resolve_field("password", "env::_CALBRIDGE_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.starts_with("[caldav] password:"));
        assert!(err.contains("not set"));
    }

    #[test]
    fn errors_never_echo_inline_secrets() {
        let err = resolve_field("password", " ").unwrap_err();
        assert_eq!(err, "[caldav] password: inline value is empty");
    }

    #[test]
    fn missing_pass_entry_errors() {
        // Fails either on the missing binary or on the missing entry.
        let err = SecretRef::Pass("nonexistent/entry/that/should/not/exist/12345")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, SecretError::Pass { .. } | SecretError::Empty(_)));
    }
}
