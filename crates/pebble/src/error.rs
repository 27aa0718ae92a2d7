// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the Pebble client.

use thiserror::Error;

/// Errors from supervisor operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The supervisor socket could not be reached.
    #[error("Supervisor unavailable at {socket}: {reason}")]
    SupervisorUnavailable {
        /// Socket path (or container name for in-memory supervisors).
        socket: String,
        /// Underlying connection failure.
        reason: String,
    },

    /// The API answered with an error envelope or non-2xx status.
    #[error("Pebble API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// A change finished in an error state.
    #[error("Change {id} failed: {err}")]
    ChangeFailed {
        /// Change ID.
        id: String,
        /// Error text reported by the change.
        err: String,
    },

    /// The response could not be interpreted.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// HTTP transport failed after connecting.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Request construction failed.
    #[error("HTTP request error: {0}")]
    Request(#[from] hyper::http::Error),

    /// Websocket transport failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Layer YAML serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the supervisor could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::SupervisorUnavailable { .. })
    }
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;
