use thiserror::Error;

use crate::ids::{ContextId, SpanId};

#[derive(Debug, Error)]
pub enum SpanweaveError {
    #[error("span {0} already ended")]
    FinishedSpan(SpanId),

    #[error("cannot end the sentinel span: the span stack is empty")]
    SentinelEnd,

    #[error("parent span {0} not found in owning context")]
    MissingParent(SpanId),

    #[error("invalid span tree state: expected exactly one rootless span, found {0}")]
    InvalidTreeState(usize),

    #[error("global span tree requested on non-root context {0}")]
    NotRoot(ContextId),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SpanweaveError>;
