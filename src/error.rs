//! Unified error type hierarchy for trayctl
//!
//! Provides structured error handling with ConfigError, PatchError and
//! ResourceError. Nothing past startup is allowed to abort the event loop:
//! per-action failures are logged at the call site and the loop moves on.

use std::io;
use thiserror::Error;

/// Startup configuration errors. These are fatal: the panel never starts
/// with a missing or malformed configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Backend config document errors.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Backend config path missing: {0}")]
    PathNotFound(String),

    #[error("Invalid JSON in backend config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Backend config persist failed: {0}")]
    PersistFailed(String),

    #[error("IO error during backend config operations: {0}")]
    IoError(#[from] io::Error),
}

/// External resource operation errors. All variants are logged and the
/// originating control keeps its previous checked state.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    /// Spawning or waiting on an external command failed
    #[error("Command '{cmd}' failed: {reason}")]
    CommandFailed { cmd: String, reason: String },

    /// The OS process list could not be obtained; callers treat the
    /// queried process as not running
    #[error("Process query failed: {0}")]
    QueryFailed(String),

    /// A system proxy flag write failed; the toggle is considered
    /// not-applied and the settings-changed broadcast is skipped
    #[error("Proxy setting '{key}' write failed: {reason}")]
    ProxyFlagFailed { key: String, reason: String },
}
