//! # parley
//!
//! Command-line front ends for the relay server and the chat client.
//! Settings resolve as: compiled defaults, then the settings file, then
//! `PARLEY_*` environment variables, then command-line flags.

#![deny(unsafe_code)]

pub mod cli;
pub mod signals;

use parley_core::logging;
use parley_settings::{LogFormat, LoggingSettings};

/// Install the global subscriber described by `settings`.
pub fn init_logging(settings: &LoggingSettings) {
    let level = settings.level.as_filter_str();
    match settings.format {
        LogFormat::Compact => logging::init_subscriber(level),
        LogFormat::Json => logging::init_json_subscriber(level),
    }
}
