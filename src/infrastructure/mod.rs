//! Infrastructure layer: HTTP transport, configuration loading, logging.

pub mod config;
pub mod http;
pub mod logging;
