//! Library-level error types.
//!
//! Leaf errors are modeled with `thiserror`; call sites that aggregate
//! several fallible steps (config load, manager construction) wrap them
//! with `anyhow::Context` instead of inventing another enum.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config field {field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AofError {
    #[error("failed to open AOF file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write AOF record")]
    Write(#[source] std::io::Error),
    #[error("failed to flush AOF buffer")]
    Flush(#[source] std::io::Error),
    #[error("failed to sync AOF file to stable storage")]
    Sync(#[source] std::io::Error),
    #[error("failed to encode AOF record")]
    Encode(#[source] serde_json::Error),
}
