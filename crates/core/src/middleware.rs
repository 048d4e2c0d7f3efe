use std::rc::Rc;

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::model::log::LogRecord;
use crate::sink::LogSink;

/// One processor in the ordered log chain.
///
/// A middleware forwards the record by calling `chain.next(record)`; not
/// calling it halts propagation. A returned error aborts the rest of the
/// chain and surfaces to the original `log` caller.
pub trait LoggerMiddleware {
    fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()>;
}

/// Cursor over the middleware list, handed to each middleware as its
/// explicit continuation.
pub struct Chain<'a> {
    middlewares: &'a [Rc<dyn LoggerMiddleware>],
    index: usize,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(middlewares: &'a [Rc<dyn LoggerMiddleware>]) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Runs the next middleware in list order, if any.
    pub fn next(&mut self, record: &mut LogRecord) -> Result<()> {
        if self.index < self.middlewares.len() {
            let middleware = Rc::clone(&self.middlewares[self.index]);
            self.index += 1;
            middleware.handle(record, self)?;
        }
        Ok(())
    }
}

/// Attaches records to the bound span, subject to a sampling draw.
///
/// A sampled-out record halts the chain entirely. Attaching to an
/// already-ended span is a usage bug and the resulting error propagates.
pub struct SpanLogMiddleware {
    sampling_rate: f64,
}

impl SpanLogMiddleware {
    pub fn new(sampling_rate: f64) -> Self {
        Self {
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SpanLogMiddleware {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LoggerMiddleware for SpanLogMiddleware {
    fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()> {
        // random() draws from [0, 1): rate 0 drops everything, rate 1 nothing.
        if rand::random::<f64>() >= self.sampling_rate {
            return Ok(());
        }
        if let Some(span) = &record.span {
            span.log(record)?;
        }
        chain.next(record)
    }
}

/// Maps a record to extra output fields.
pub type FieldSelector = Box<dyn Fn(&LogRecord) -> Map<String, Value>>;

/// Projects records into flat field maps and emits them through a sink.
pub struct ConsoleMiddleware {
    sink: Rc<dyn LogSink>,
    include_context: bool,
    include_span: bool,
    field_selector: Option<FieldSelector>,
}

impl ConsoleMiddleware {
    pub fn new(sink: Rc<dyn LogSink>) -> Self {
        Self {
            sink,
            include_context: false,
            include_span: false,
            field_selector: None,
        }
    }

    pub fn with_context(mut self, include: bool) -> Self {
        self.include_context = include;
        self
    }

    pub fn with_span(mut self, include: bool) -> Self {
        self.include_span = include;
        self
    }

    pub fn with_field_selector(mut self, selector: FieldSelector) -> Self {
        self.field_selector = Some(selector);
        self
    }
}

impl LoggerMiddleware for ConsoleMiddleware {
    fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("level".to_string(), json!(record.level.label()));
        fields.insert("timestamp".to_string(), json!(record.timestamp.to_rfc3339()));

        if let Some(selector) = &self.field_selector {
            fields.extend(selector(record));
        }

        if self.include_context {
            if let Some(context) = &record.context {
                fields.insert("trace_id".to_string(), json!(context.trace_id().as_str()));
                fields.insert("context_id".to_string(), json!(context.id().as_str()));
                fields.insert("module".to_string(), json!(context.module()));
            }
        }

        let mut message = record.message.clone();
        if self.include_span {
            if let Some(span) = &record.span {
                let data = span.get();
                fields.insert("span_id".to_string(), json!(data.id.as_str()));
                fields.insert("span_name".to_string(), json!(data.name));
                message = format!("{}{message}", "  ".repeat(data.depth as usize));
            }
        }

        if let Some(error) = &record.error {
            fields.insert("error".to_string(), json!(error));
        }

        self.sink.emit(record.level, &message, &fields);
        chain.next(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::Utc;

    use crate::context::{Context, ContextOptions};
    use crate::error::SpanweaveError;
    use crate::model::log::LogLevel;

    struct Trace {
        seen: Rc<RefCell<Vec<&'static str>>>,
        tag: &'static str,
        forward: bool,
    }

    impl LoggerMiddleware for Trace {
        fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()> {
            self.seen.borrow_mut().push(self.tag);
            if self.forward {
                chain.next(record)?;
            }
            Ok(())
        }
    }

    fn record() -> LogRecord {
        LogRecord {
            level: LogLevel::Info,
            message: "msg".to_string(),
            timestamp: Utc::now(),
            data: None,
            error: None,
            context: None,
            span: None,
        }
    }

    #[test]
    fn chain_runs_in_list_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> = vec![
            Rc::new(Trace {
                seen: Rc::clone(&seen),
                tag: "first",
                forward: true,
            }),
            Rc::new(Trace {
                seen: Rc::clone(&seen),
                tag: "second",
                forward: true,
            }),
        ];
        Chain::new(&middlewares).next(&mut record()).unwrap();
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn skipping_next_halts_the_chain() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> = vec![
            Rc::new(Trace {
                seen: Rc::clone(&seen),
                tag: "blocker",
                forward: false,
            }),
            Rc::new(Trace {
                seen: Rc::clone(&seen),
                tag: "unreached",
                forward: true,
            }),
        ];
        Chain::new(&middlewares).next(&mut record()).unwrap();
        assert_eq!(*seen.borrow(), vec!["blocker"]);
    }

    #[test]
    fn zero_sampling_never_attaches() {
        let ctx = Context::root(ContextOptions::default());
        let span = ctx.start_span("work", Map::new());
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> =
            vec![Rc::new(SpanLogMiddleware::new(0.0))];

        for _ in 0..100 {
            let mut rec = record();
            rec.span = Some(span.clone());
            Chain::new(&middlewares).next(&mut rec).unwrap();
        }
        assert!(span.get().logs.is_empty());
    }

    #[test]
    fn full_sampling_always_attaches() {
        let ctx = Context::root(ContextOptions::default());
        let span = ctx.start_span("work", Map::new());
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> =
            vec![Rc::new(SpanLogMiddleware::default())];

        for _ in 0..20 {
            let mut rec = record();
            rec.span = Some(span.clone());
            Chain::new(&middlewares).next(&mut rec).unwrap();
        }
        assert_eq!(span.get().logs.len(), 20);
    }

    #[test]
    fn attaching_to_ended_span_aborts_chain() {
        let ctx = Context::root(ContextOptions::default());
        let span = ctx.start_span("work", Map::new());
        span.end();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> = vec![
            Rc::new(SpanLogMiddleware::default()),
            Rc::new(Trace {
                seen: Rc::clone(&seen),
                tag: "after",
                forward: true,
            }),
        ];

        let mut rec = record();
        rec.span = Some(span);
        let err = Chain::new(&middlewares).next(&mut rec).unwrap_err();
        assert!(matches!(err, SpanweaveError::FinishedSpan(_)));
        assert!(seen.borrow().is_empty());
    }
}
