//! Built-in plugins.
//!
//! Each module exports a candidate factory and submits it to the catalog
//! with `plugin_module!`.

pub mod finance;
pub mod info;
pub mod log_analyzer;
