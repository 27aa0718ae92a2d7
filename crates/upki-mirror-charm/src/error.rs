// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the upki-mirror charm.

use thiserror::Error;

/// Charm errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Workload supervisor operation failed.
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] pebble::Error),

    /// A Juju hook tool exited non-zero.
    #[error("Hook tool {tool} failed with exit code {exit_code}: {stderr}")]
    HookTool {
        /// Tool name, e.g. `status-set`.
        tool: String,
        /// Exit code of the tool.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// A port string could not be parsed.
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the workload supervisor could not be reached.
    ///
    /// Hooks failing this way exit non-zero so the platform re-delivers them.
    pub fn is_supervisor_unavailable(&self) -> bool {
        matches!(self, Error::Supervisor(e) if e.is_unavailable())
    }
}

/// Result type using the charm Error.
pub type Result<T> = std::result::Result<T, Error>;
