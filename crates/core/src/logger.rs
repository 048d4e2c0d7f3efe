use std::rc::Rc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::middleware::{Chain, ConsoleMiddleware, LoggerMiddleware, SpanLogMiddleware};
use crate::model::log::{LogLevel, LogRecord};
use crate::model::span::Span;
use crate::sink::LogSink;

/// Ordered middleware list plus the level filter threshold.
pub struct LoggerConfig {
    pub middlewares: Vec<Rc<dyn LoggerMiddleware>>,
    pub min_level: LogLevel,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
            min_level: LogLevel::Debug,
        }
    }
}

/// Dispatches log records through the middleware chain, optionally scoped
/// to a context/span pair.
pub struct Logger {
    middlewares: Vec<Rc<dyn LoggerMiddleware>>,
    min_level: LogLevel,
    context: Option<Context>,
    span: Option<Span>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        Self::bound(config, None, None)
    }

    pub(crate) fn bound(config: LoggerConfig, context: Option<Context>, span: Option<Span>) -> Self {
        Self {
            middlewares: config.middlewares,
            min_level: config.min_level,
            context,
            span,
        }
    }

    /// Builds the standard chain (span-log + console) from ambient config.
    pub fn from_config(cfg: &Config, context: Option<Context>, sink: Rc<dyn LogSink>) -> Self {
        let middlewares: Vec<Rc<dyn LoggerMiddleware>> = vec![
            Rc::new(SpanLogMiddleware::new(cfg.sampling_rate)),
            Rc::new(
                ConsoleMiddleware::new(sink)
                    .with_context(cfg.include_context)
                    .with_span(cfg.include_span),
            ),
        ];
        Self::bound(
            LoggerConfig {
                middlewares,
                min_level: cfg.min_level,
            },
            context,
            None,
        )
    }

    /// A logger scoped to the given span, sharing this logger's chain.
    pub fn for_span(&self, span: Span) -> Self {
        Self {
            middlewares: self.middlewares.clone(),
            min_level: self.min_level,
            context: self.context.clone(),
            span: Some(span),
        }
    }

    /// Emits a record unless `level` falls below the configured threshold.
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Map<String, Value>>,
    ) -> Result<()> {
        if level < self.min_level {
            return Ok(());
        }
        self.dispatch(self.record(level, message.into(), None, data))
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<Map<String, Value>>) -> Result<()> {
        self.log(LogLevel::Debug, message, data)
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Map<String, Value>>) -> Result<()> {
        self.log(LogLevel::Info, message, data)
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Map<String, Value>>) -> Result<()> {
        self.log(LogLevel::Warn, message, data)
    }

    /// Error records bypass the level filter and always carry the error.
    pub fn error(
        &self,
        message: impl Into<String>,
        error: Option<&str>,
        data: Option<Map<String, Value>>,
    ) -> Result<()> {
        self.dispatch(self.record(
            LogLevel::Error,
            message.into(),
            error.map(str::to_string),
            data,
        ))
    }

    fn record(
        &self,
        level: LogLevel,
        message: String,
        error: Option<String>,
        data: Option<Map<String, Value>>,
    ) -> LogRecord {
        LogRecord {
            level,
            message,
            timestamp: Utc::now(),
            data,
            error,
            context: self.context.clone(),
            span: self.span.clone(),
        }
    }

    fn dispatch(&self, mut record: LogRecord) -> Result<()> {
        Chain::new(&self.middlewares).next(&mut record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::context::ContextOptions;

    struct Collect {
        levels: Rc<RefCell<Vec<LogLevel>>>,
    }

    impl LoggerMiddleware for Collect {
        fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()> {
            self.levels.borrow_mut().push(record.level);
            chain.next(record)
        }
    }

    fn collecting_logger(min_level: LogLevel) -> (Logger, Rc<RefCell<Vec<LogLevel>>>) {
        let levels = Rc::new(RefCell::new(Vec::new()));
        let logger = Logger::new(LoggerConfig {
            middlewares: vec![Rc::new(Collect {
                levels: Rc::clone(&levels),
            })],
            min_level,
        });
        (logger, levels)
    }

    #[test]
    fn filters_below_min_level() {
        let (logger, levels) = collecting_logger(LogLevel::Warn);
        logger.debug("quiet", None).unwrap();
        logger.info("quiet", None).unwrap();
        logger.warn("loud", None).unwrap();
        assert_eq!(*levels.borrow(), vec![LogLevel::Warn]);
    }

    #[test]
    fn error_bypasses_min_level() {
        let (logger, levels) = collecting_logger(LogLevel::Error);
        logger.error("boom", Some("cause"), None).unwrap();
        assert_eq!(*levels.borrow(), vec![LogLevel::Error]);
    }

    #[test]
    fn record_captures_bound_context_and_span() {
        let ctx = Context::root(ContextOptions::default());
        let span = ctx.start_span("work", Map::new());

        struct Check;
        impl LoggerMiddleware for Check {
            fn handle(&self, record: &mut LogRecord, chain: &mut Chain<'_>) -> Result<()> {
                assert!(record.context.is_some());
                let bound = record.span.as_ref().expect("span bound");
                assert_eq!(bound.get().name, "work");
                chain.next(record)
            }
        }

        let logger = ctx
            .logger(LoggerConfig {
                middlewares: vec![Rc::new(Check)],
                min_level: LogLevel::Debug,
            })
            .for_span(span);
        logger.info("scoped", None).unwrap();
    }

    #[test]
    fn middleware_error_surfaces_to_caller() {
        let ctx = Context::root(ContextOptions::default());
        let span = ctx.start_span("work", Map::new());
        span.end();

        let logger = Logger::new(LoggerConfig {
            middlewares: vec![Rc::new(SpanLogMiddleware::default())],
            min_level: LogLevel::Debug,
        })
        .for_span(span);
        assert!(logger.info("late", None).is_err());
    }
}
