// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor trait definitions.
//!
//! Defines the abstract interface to a workload supervisor.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layer::{Layer, Startup};

/// A one-shot command to run inside the workload container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Program and arguments.
    pub command: Vec<String>,
    /// Environment for the process.
    pub environment: BTreeMap<String, String>,
    /// Working directory, supervisor default when unset.
    pub working_dir: Option<String>,
}

impl ExecRequest {
    /// Build a request from an argv slice with no extra environment.
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Attach an environment.
    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Output of a process that exited with `exit_code`.
    pub fn exited(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runtime state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Running.
    Active,
    /// Stopped, or never started.
    Inactive,
    /// Exited and waiting to be restarted.
    Backoff,
    /// Gave up restarting.
    Error,
}

/// A service in the plan with its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Startup mode from the plan.
    #[serde(default)]
    pub startup: Startup,
    /// Current state.
    pub current: ServiceStatus,
}

impl ServiceInfo {
    /// Whether the service is running.
    pub fn is_active(&self) -> bool {
        self.current == ServiceStatus::Active
    }
}

/// Trait for workload supervisors.
///
/// One value addresses one container. Implementations talk to the container's
/// supervisor; they carry no operator logic.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Container this supervisor manages.
    fn container_name(&self) -> &str;

    /// Whether the supervisor answers at all.
    async fn can_connect(&self) -> bool;

    /// Add a layer under `label`.
    ///
    /// With `combine`, an existing layer of the same label is combined entry
    /// by entry; without it an existing label is an error.
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()>;

    /// Bring running services in line with the plan.
    ///
    /// Starts enabled services and restarts the ones whose definition
    /// changed. Unchanged running services are left alone.
    async fn replan(&self) -> Result<()>;

    /// Services in the plan, restricted to `names` unless empty.
    ///
    /// Names not in the plan are left out of the result.
    async fn services(&self, names: &[&str]) -> Result<Vec<ServiceInfo>>;

    /// Restart the named services, starting the ones not running.
    ///
    /// Other services are left alone whatever their startup mode.
    async fn restart(&self, services: &[&str]) -> Result<()>;

    /// Stop the named services.
    async fn stop(&self, services: &[&str]) -> Result<()>;

    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit is reported through [`ExecOutput::exit_code`], not as
    /// an error.
    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput>;

    /// Write `content` to `path` inside the container.
    async fn push(&self, path: &str, content: &[u8], make_dirs: bool) -> Result<()>;
}
