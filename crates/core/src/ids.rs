use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trace identifier shared by every span and context in one logical trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

/// Identifier of a single span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

/// Identifier of a single context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(String);

impl TraceId {
    pub fn new(source: &dyn IdSource) -> Self {
        Self(source.new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SpanId {
    pub fn new(source: &dyn IdSource) -> Self {
        Self(source.new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ContextId {
    pub fn new(source: &dyn IdSource) -> Self {
        Self(source.new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of globally-unique opaque identifiers.
///
/// The core never inspects the produced strings; it only requires uniqueness
/// within the lifetime of a trace. Swap in a deterministic source for tests.
pub trait IdSource {
    fn new_id(&self) -> String;
}

/// Default id source backed by random UUIDs.
#[derive(Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

pub fn default_id_source() -> Rc<dyn IdSource> {
    Rc::new(UuidSource)
}
