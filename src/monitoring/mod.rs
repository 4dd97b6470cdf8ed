//! Monitoring Module
//!
//! Observability for the plugin host:
//! - Structured logging

pub mod logging;

pub use logging::{init_logging, LogFormat, LogLevel, LoggerConfig};
