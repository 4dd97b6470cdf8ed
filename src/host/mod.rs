//! Host Shell Module
//!
//! The surfaces the host application consumes:
//! - Host configuration
//! - Install-hook context
//! - Route table

pub mod config;
pub mod context;
pub mod routes;

pub use config::HostConfig;
pub use context::AppContext;
pub use routes::RouteTable;
