//! Configuration system for the Keystone multiblock engine.
//!
//! Provides runtime-configurable settings that persist to disk as RON files,
//! with hot-reload detection and forward/backward compatible serialization.

mod config;
mod error;

pub use config::{Config, LoggingConfig, MultiblockConfig, StorageConfig};
pub use error::ConfigError;
