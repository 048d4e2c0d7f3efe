pub mod log;
pub mod span;
