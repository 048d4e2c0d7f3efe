//! In-process tracing: nested spans on per-context stacks, forked contexts
//! for concurrent branches, mergeable span trees, and an ordered log
//! middleware chain.
//!
//! A caller opens a root [`Context`], starts and ends spans on it with
//! stack discipline, forks child contexts for independent sub-work, and
//! emits structured records through a [`Logger`]. The root context can
//! assemble the global span tree across every fork at any point.
//!
//! ```
//! use serde_json::Map;
//! use spanweave::{Context, ContextOptions};
//!
//! let ctx = Context::root(ContextOptions {
//!     module: Some("svc".to_string()),
//!     ..ContextOptions::default()
//! });
//! ctx.start_span("handle-request", Map::new());
//! ctx.start_span("db-query", Map::new());
//! ctx.end_span(None).unwrap();
//! ctx.end_span(None).unwrap();
//!
//! let tree = ctx.local_span_tree().unwrap();
//! assert_eq!(tree.node_count(), 3);
//! ```

pub use spanweave_core::config::Config;
pub use spanweave_core::context::{Context, ContextOptions, ContextSnapshot};
pub use spanweave_core::error::{Result, SpanweaveError};
pub use spanweave_core::ids::{ContextId, IdSource, SpanId, TraceId, UuidSource};
pub use spanweave_core::logger::{Logger, LoggerConfig};
pub use spanweave_core::middleware::{
    Chain, ConsoleMiddleware, FieldSelector, LoggerMiddleware, SpanLogMiddleware,
};
pub use spanweave_core::model::log::{LogEntry, LogLevel, LogRecord};
pub use spanweave_core::model::span::{Span, SpanData, SpanStatus};
pub use spanweave_core::sink::{ConsoleSink, LogSink};
pub use spanweave_core::tree::SpanNode;

pub mod prelude {
    pub use spanweave_core::context::{Context, ContextOptions};
    pub use spanweave_core::logger::{Logger, LoggerConfig};
    pub use spanweave_core::model::log::LogLevel;
    pub use spanweave_core::model::span::{Span, SpanStatus};
    pub use spanweave_core::tree::SpanNode;
}
