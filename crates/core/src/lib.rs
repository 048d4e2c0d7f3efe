pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod logger;
pub mod middleware;
pub mod model;
pub mod sink;
pub mod tree;

pub use error::{Result, SpanweaveError};
