use std::io::IsTerminal;

use owo_colors::OwoColorize;
use serde_json::{Map, Value};

use crate::model::log::LogLevel;

/// External output collaborator for the console middleware.
///
/// The core only assembles the projection; where it goes (console, file,
/// test capture) is the sink's business.
pub trait LogSink {
    fn emit(&self, level: LogLevel, message: &str, fields: &Map<String, Value>);
}

/// Sink writing one line per record to stderr, with the level label colored
/// when stderr is a terminal.
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for ConsoleSink {
    fn emit(&self, level: LogLevel, message: &str, fields: &Map<String, Value>) {
        let label = if self.color {
            match level {
                LogLevel::Debug => level.label().dimmed().to_string(),
                LogLevel::Info => level.label().green().to_string(),
                LogLevel::Warn => level.label().yellow().to_string(),
                LogLevel::Error => level.label().red().to_string(),
            }
        } else {
            level.label().to_string()
        };
        eprintln!("{label} {message} {}", Value::Object(fields.clone()));
    }
}
