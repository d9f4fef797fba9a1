//! Logging setup

pub mod structured;

pub use structured::{init_logging, LoggingGuard};
