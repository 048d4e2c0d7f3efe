use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::SpanweaveError;
use crate::model::span::Span;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 5,
    Info = 9,
    Warn = 13,
    Error = 17,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = SpanweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            _ => Err(SpanweaveError::Config(format!("unknown log level: {s}"))),
        }
    }
}

/// One log record travelling through the middleware chain.
///
/// Holds the bound context and span as cheap handles, not snapshots, so a
/// middleware can reach back into the live span (e.g. to attach the record).
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: Option<Map<String, Value>>,
    pub error: Option<String>,
    pub context: Option<Context>,
    pub span: Option<Span>,
}

impl LogRecord {
    /// Detached form of this record, safe to store on a span.
    pub fn to_entry(&self) -> LogEntry {
        LogEntry {
            level: self.level,
            message: self.message.clone(),
            timestamp: self.timestamp,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

/// A log record as retained on a span: no live handles, plain data only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
