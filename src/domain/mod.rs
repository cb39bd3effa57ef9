//! Domain layer: pure data types, the transport error taxonomy, and ports.

pub mod errors;
pub mod models;
pub mod ports;
