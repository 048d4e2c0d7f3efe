use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Map, Value};
use spanweave_core::context::{Context, ContextOptions};
use spanweave_core::ids::IdSource;
use spanweave_core::model::log::LogLevel;
use spanweave_core::sink::LogSink;

/// Deterministic id source: "id-1", "id-2", ...
#[derive(Default)]
pub struct SeqIdSource {
    counter: Cell<u64>,
}

impl IdSource for SeqIdSource {
    fn new_id(&self) -> String {
        let next = self.counter.get() + 1;
        self.counter.set(next);
        format!("id-{next}")
    }
}

/// One emission captured by [`CaptureSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedLine {
    pub level: LogLevel,
    pub message: String,
    pub fields: Map<String, Value>,
}

/// Sink recording every emission for assertions.
#[derive(Default, Clone)]
pub struct CaptureSink {
    lines: Rc<RefCell<Vec<CapturedLine>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .map(|l| l.message.clone())
            .collect()
    }
}

impl LogSink for CaptureSink {
    fn emit(&self, level: LogLevel, message: &str, fields: &Map<String, Value>) {
        self.lines.borrow_mut().push(CapturedLine {
            level,
            message: message.to_string(),
            fields: fields.clone(),
        });
    }
}

/// A root context with deterministic ids, module "svc", and a started
/// "handle-request" span, mirroring the common request-handling shape.
pub fn sample_context() -> Context {
    let ctx = Context::root(ContextOptions {
        module: Some("svc".to_string()),
        id_source: Some(Rc::new(SeqIdSource::default())),
        ..ContextOptions::default()
    });
    ctx.start_span("handle-request", Map::new());
    ctx
}
