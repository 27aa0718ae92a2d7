// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pebble workload supervisor client.
//!
//! Pebble runs as PID 1 in a workload container and exposes an HTTP API on a
//! unix socket shared with the charm container. This crate covers the part
//! of that API an operator needs:
//!
//! | Endpoint | Operation |
//! |----------|-----------|
//! | `GET /v1/system-info` | [`Supervisor::can_connect`] |
//! | `POST /v1/layers` | [`Supervisor::add_layer`] |
//! | `POST /v1/services` (`replan`) | [`Supervisor::replan`] |
//! | `GET /v1/services` | [`Supervisor::services`] |
//! | `POST /v1/services` (`restart`, `stop`) | [`Supervisor::restart`], [`Supervisor::stop`] |
//! | `POST /v1/exec` + task websockets | [`Supervisor::exec`] |
//! | `POST /v1/files` (`write`) | [`Supervisor::push`] |
//! | `GET /v1/changes/{id}/wait` | completion of async operations |
//!
//! # Modules
//!
//! - [`layer`]: layer documents and combination rules
//! - [`client`]: the HTTP client over the unix socket
//! - [`mock`]: in-memory supervisor for tests
//! - [`error`]: error types

#![deny(missing_docs)]

/// HTTP client for the Pebble API.
pub mod client;

/// Error types.
pub mod error;

mod exec;

/// Layer documents.
pub mod layer;

/// In-memory supervisor for tests.
pub mod mock;

mod traits;

pub use client::{PebbleClient, PebbleClientConfig};
pub use error::{Error, Result};
pub use layer::{Check, CheckLevel, ExecCheck, Layer, Override, Service, Startup, TcpCheck};
pub use mock::MockSupervisor;
pub use traits::*;
