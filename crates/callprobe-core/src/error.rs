//! Error types for the fallible edges of the engine
//!
//! The analysis path itself never fails: short payloads, thin samples and
//! incomplete calls degrade to defaults. Only configuration and packet
//! loading can return errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating an [`crate::config::AnalysisConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors loading a classified packet set
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read packets from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed packet list: {0}")]
    Parse(#[from] serde_json::Error),
}
