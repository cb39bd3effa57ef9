//! Ports: trait seams between the domain and infrastructure adapters.

pub mod vision_client;

pub use vision_client::VisionClient;
