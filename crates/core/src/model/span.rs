use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SpanweaveError};
use crate::ids::{SpanId, TraceId};
use crate::model::log::{LogEntry, LogRecord};

/// Attribute key marking a context's sentinel span.
pub const SENTINEL_ATTR: &str = "sentinel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Active,
    Success,
    Error,
}

/// Plain data of one span. `Span::get` hands out deep owned copies of this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanData {
    pub id: SpanId,
    pub trace_id: TraceId,
    /// Absent only for a context's sentinel span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SpanId>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attributes: Map<String, Value>,
    pub logs: Vec<LogEntry>,
    /// Position in the logical call stack, counting across context forks.
    pub depth: u32,
}

impl SpanData {
    pub fn is_sentinel(&self) -> bool {
        self.attributes
            .get(SENTINEL_ATTR)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0))
    }
}

/// Shared handle to one span.
///
/// Handles are cheap to clone; the owning context keeps one in its span
/// arena and callers hold others. The core is single-threaded per context,
/// so interior mutability is `RefCell`, not a lock.
#[derive(Debug, Clone)]
pub struct Span {
    data: Rc<RefCell<SpanData>>,
}

impl Span {
    pub(crate) fn start(
        id: SpanId,
        trace_id: TraceId,
        parent_id: Option<SpanId>,
        name: String,
        attributes: Map<String, Value>,
        depth: u32,
    ) -> Self {
        Self {
            data: Rc::new(RefCell::new(SpanData {
                id,
                trace_id,
                parent_id,
                name,
                start_time: Utc::now(),
                end_time: None,
                status: SpanStatus::Active,
                error: None,
                attributes,
                logs: Vec::new(),
                depth,
            })),
        }
    }

    pub fn id(&self) -> SpanId {
        self.data.borrow().id.clone()
    }

    pub fn parent_id(&self) -> Option<SpanId> {
        self.data.borrow().parent_id.clone()
    }

    pub fn is_sentinel(&self) -> bool {
        self.data.borrow().is_sentinel()
    }

    pub fn is_ended(&self) -> bool {
        self.data.borrow().end_time.is_some()
    }

    /// Merges the given keys into the span's attributes.
    pub fn set_attributes(&self, attributes: Map<String, Value>) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if data.end_time.is_some() {
            return Err(SpanweaveError::FinishedSpan(data.id.clone()));
        }
        data.attributes.extend(attributes);
        Ok(())
    }

    /// Records an error and forces the status to `Error`.
    pub fn record_error(&self, error: impl Into<String>) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if data.end_time.is_some() {
            return Err(SpanweaveError::FinishedSpan(data.id.clone()));
        }
        data.error = Some(error.into());
        data.status = SpanStatus::Error;
        Ok(())
    }

    /// Ends the span. Idempotent: ending an already-ended span changes
    /// nothing. A status still `Active` is promoted to `Success`; an earlier
    /// `record_error` is preserved.
    pub fn end(&self) {
        let mut data = self.data.borrow_mut();
        if data.end_time.is_some() {
            return;
        }
        data.end_time = Some(Utc::now());
        if data.status == SpanStatus::Active {
            data.status = SpanStatus::Success;
        }
    }

    /// Appends a detached copy of the record to the span's logs.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        let mut data = self.data.borrow_mut();
        if data.end_time.is_some() {
            return Err(SpanweaveError::FinishedSpan(data.id.clone()));
        }
        data.logs.push(record.to_entry());
        Ok(())
    }

    /// Returns a deep snapshot. Mutating the returned value never affects
    /// the span, and two snapshots are independent of each other.
    pub fn get(&self) -> SpanData {
        self.data.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UuidSource;
    use crate::model::log::LogLevel;
    use serde_json::json;

    fn test_span() -> Span {
        let ids = UuidSource;
        Span::start(
            SpanId::new(&ids),
            TraceId::new(&ids),
            None,
            "test".to_string(),
            Map::new(),
            1,
        )
    }

    fn test_record() -> LogRecord {
        LogRecord {
            level: LogLevel::Info,
            message: "hello".to_string(),
            timestamp: Utc::now(),
            data: None,
            error: None,
            context: None,
            span: None,
        }
    }

    #[test]
    fn set_attributes_merges() {
        let span = test_span();
        let mut first = Map::new();
        first.insert("a".to_string(), json!(1));
        span.set_attributes(first).unwrap();
        let mut second = Map::new();
        second.insert("b".to_string(), json!(2));
        span.set_attributes(second).unwrap();

        let data = span.get();
        assert_eq!(data.attributes.get("a"), Some(&json!(1)));
        assert_eq!(data.attributes.get("b"), Some(&json!(2)));
    }

    #[test]
    fn end_promotes_active_to_success() {
        let span = test_span();
        assert_eq!(span.get().status, SpanStatus::Active);
        span.end();
        let data = span.get();
        assert_eq!(data.status, SpanStatus::Success);
        assert!(data.end_time.is_some());
    }

    #[test]
    fn end_is_idempotent() {
        let span = test_span();
        span.end();
        let first_end = span.get().end_time;
        span.end();
        assert_eq!(span.get().end_time, first_end);
    }

    #[test]
    fn end_preserves_recorded_error() {
        let span = test_span();
        span.record_error("engine failure").unwrap();
        span.end();
        let data = span.get();
        assert_eq!(data.status, SpanStatus::Error);
        assert_eq!(data.error.as_deref(), Some("engine failure"));
    }

    #[test]
    fn mutation_after_end_fails() {
        let span = test_span();
        span.end();
        assert!(matches!(
            span.set_attributes(Map::new()),
            Err(SpanweaveError::FinishedSpan(_))
        ));
        assert!(matches!(
            span.record_error("late"),
            Err(SpanweaveError::FinishedSpan(_))
        ));
        assert!(matches!(
            span.log(&test_record()),
            Err(SpanweaveError::FinishedSpan(_))
        ));
    }

    #[test]
    fn snapshots_are_independent() {
        let span = test_span();
        let mut attrs = Map::new();
        attrs.insert("a".to_string(), json!(1));
        span.set_attributes(attrs).unwrap();

        let mut copy = span.get();
        copy.attributes.insert("b".to_string(), json!(2));
        copy.name = "mutated".to_string();

        let fresh = span.get();
        assert_eq!(fresh.name, "test");
        assert!(!fresh.attributes.contains_key("b"));
    }

    #[test]
    fn log_appends_detached_entry() {
        let span = test_span();
        span.log(&test_record()).unwrap();
        span.log(&test_record()).unwrap();
        let data = span.get();
        assert_eq!(data.logs.len(), 2);
        assert_eq!(data.logs[0].message, "hello");
    }

    #[test]
    fn duration_requires_end() {
        let span = test_span();
        assert_eq!(span.get().duration_ms(), None);
        span.end();
        assert!(span.get().duration_ms().unwrap() >= 0);
    }
}
