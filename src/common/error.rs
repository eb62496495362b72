//! Error Types.
//!
//! Configuration errors are fatal: they identify the offending input
//! (file, tag, or trace line) and abort the run. Backpressure and
//! command-not-ready conditions are not errors; they are expressed as
//! `bool` returns on the hot path and retried on the next cycle.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// A fatal configuration problem detected while building the simulator.
#[derive(Debug)]
pub enum ConfigError {
    /// A referenced file could not be opened or read.
    Io { path: PathBuf, source: io::Error },

    /// The YAML configuration failed to parse.
    Parse { path: PathBuf, message: String },

    /// An implementation tag did not match any known implementation.
    UnknownImpl { component: &'static str, tag: String },

    /// A trace file contained a line that does not follow the format.
    TraceFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A parameter was outside its valid range.
    BadParameter { name: &'static str, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read '{}': {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "cannot parse '{}': {}", path.display(), message)
            }
            ConfigError::UnknownImpl { component, tag } => {
                write!(f, "unknown {} implementation '{}'", component, tag)
            }
            ConfigError::TraceFormat {
                path,
                line,
                message,
            } => {
                write!(
                    f,
                    "trace '{}' line {}: {}",
                    path.display(),
                    line,
                    message
                )
            }
            ConfigError::BadParameter { name, message } => {
                write!(f, "parameter '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
