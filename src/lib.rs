//! Exile Tracker: periodic build snapshots for Path of Exile characters
//!
//! This crate polls the character-window API for tracked characters, renders
//! each character into a Path of Building export through a headless engine,
//! stores the export when it differs from the previous snapshot and publishes
//! it to a build-sharing site.

pub mod config;
pub mod poe;
pub mod publish;
pub mod renderer;
pub mod scheduler;
pub mod snapshot;
pub mod storage;

use thiserror::Error;

/// Main error type for Exile Tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API client error: {0}")]
    Api(#[from] poe::ApiError),

    #[error("Publisher error: {0}")]
    Publish(#[from] publish::PublishError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown build site: {0}")]
    UnknownSite(String),
}

/// Result type alias for Exile Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use scheduler::{CycleReport, FetchScheduler, SchedulerHandle};
pub use storage::{SqliteStorage, Storage};
