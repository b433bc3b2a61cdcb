//! Command-line front end for the CalDAV translation layer.
//!
//! This crate provides the `calbridge` binary: it loads `config.toml`,
//! resolves secrets, sets up logging and runs one facade operation.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
