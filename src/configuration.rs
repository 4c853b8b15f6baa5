pub mod config;

pub use config::{ClientConfig, DatabaseTarget, ServerConfig};
