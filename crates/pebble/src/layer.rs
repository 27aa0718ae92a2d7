// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Layer documents.
//!
//! A layer is a named fragment of the supervisor plan holding services and
//! health checks. Layers are serialised in Pebble's YAML format with
//! kebab-case keys. Maps are ordered so the same layer always renders to the
//! same document.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How an entry combines with an existing entry of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    /// The new entry replaces the old one entirely.
    #[default]
    Replace,
    /// Fields set on the new entry are merged into the old one.
    Merge,
}

/// Whether a service or check starts automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    /// Started on replan.
    #[default]
    Enabled,
    /// Only started explicitly.
    Disabled,
}

/// Health level a check reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    /// Liveness.
    Alive,
    /// Readiness.
    Ready,
}

/// A supervised long-running service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Service {
    /// Combination policy.
    #[serde(rename = "override")]
    pub override_: Override,
    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Command line, split by the supervisor with shell rules.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// Startup mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    /// Extra environment for the service process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

/// TCP connect check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpCheck {
    /// Port to connect to.
    pub port: u16,
    /// Host to connect to, `localhost` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Command check; exit status 0 is healthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecCheck {
    /// Command line to run.
    pub command: String,
    /// Environment for the command. Entries with empty values are kept.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

/// A periodic health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Check {
    /// Combination policy.
    #[serde(rename = "override")]
    pub override_: Override,
    /// Health level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<CheckLevel>,
    /// Interval between runs as a duration string (`30s`, `360m`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Per-run timeout as a duration string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Consecutive failures before the check is considered down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    /// Startup mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    /// TCP check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<TcpCheck>,
    /// Command check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecCheck>,
}

impl Check {
    /// Parsed period, `None` when unset or malformed.
    pub fn period_duration(&self) -> Option<Duration> {
        self.period
            .as_deref()
            .and_then(|p| humantime::parse_duration(p).ok())
    }
}

/// A layer document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Short summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Services by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, Service>,
    /// Checks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, Check>,
}

impl Layer {
    /// Render the layer in the supervisor's YAML format.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a layer from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Combine `other` into this layer, entry by entry.
    ///
    /// Entries with `override: replace` replace a same-named entry
    /// wholesale; `override: merge` entries overlay the fields they set.
    /// Entries not named in `other` are left untouched.
    pub fn combine(&mut self, other: &Layer) {
        if !other.summary.is_empty() {
            self.summary = other.summary.clone();
        }
        if !other.description.is_empty() {
            self.description = other.description.clone();
        }

        for (name, service) in &other.services {
            match (service.override_, self.services.get_mut(name)) {
                (Override::Merge, Some(existing)) => existing.merge(service),
                _ => {
                    self.services.insert(name.clone(), service.clone());
                }
            }
        }

        for (name, check) in &other.checks {
            match (check.override_, self.checks.get_mut(name)) {
                (Override::Merge, Some(existing)) => existing.merge(check),
                _ => {
                    self.checks.insert(name.clone(), check.clone());
                }
            }
        }
    }
}

impl Service {
    fn merge(&mut self, other: &Service) {
        self.override_ = other.override_;
        if !other.summary.is_empty() {
            self.summary = other.summary.clone();
        }
        if !other.command.is_empty() {
            self.command = other.command.clone();
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        self.environment.extend(other.environment.clone());
    }
}

impl Check {
    fn merge(&mut self, other: &Check) {
        self.override_ = other.override_;
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.period.is_some() {
            self.period = other.period.clone();
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout.clone();
        }
        if other.threshold.is_some() {
            self.threshold = other.threshold;
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        if other.tcp.is_some() {
            self.tcp = other.tcp.clone();
        }
        if other.exec.is_some() {
            self.exec = other.exec.clone();
        }
    }
}
