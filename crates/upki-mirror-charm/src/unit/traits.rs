// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Unit trait definitions.
//!
//! Defines the abstract interface to the platform for one unit: status,
//! ports, leadership and relation data.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use super::status::{Port, UnitStatus};
use crate::error::Result;

/// Relation data as a flat string map.
pub type RelationData = BTreeMap<String, String>;

/// Which databag of a relation to address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Databag {
    /// A unit's databag, by unit name.
    Unit(String),
    /// An application's databag, by application name.
    App(String),
}

/// Trait for the platform surface of one unit.
///
/// The real implementation shells out to Juju hook tools; tests use
/// [`super::MockUnit`].
#[async_trait]
pub trait Unit: Send + Sync {
    /// Set the unit's workload status.
    async fn set_status(&self, status: &UnitStatus) -> Result<()>;

    /// Expose a port.
    async fn open_port(&self, port: Port) -> Result<()>;

    /// Stop exposing a port.
    async fn close_port(&self, port: Port) -> Result<()>;

    /// Ports currently exposed by this unit.
    async fn opened_ports(&self) -> Result<BTreeSet<Port>>;

    /// Whether this unit is the application leader.
    async fn is_leader(&self) -> Result<bool>;

    /// Relation IDs established on `endpoint`, e.g. `ingress:4`.
    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<String>>;

    /// Remote units participating in a relation.
    async fn relation_units(&self, relation_id: &str) -> Result<Vec<String>>;

    /// Remote application of a relation, `None` before any unit joined.
    async fn remote_app(&self, relation_id: &str) -> Result<Option<String>>;

    /// Read a databag.
    async fn relation_get(&self, relation_id: &str, bag: &Databag) -> Result<RelationData>;

    /// Update this unit's databag, or the application's when `app` is set.
    ///
    /// Keys with empty values are removed.
    async fn relation_set(&self, relation_id: &str, app: bool, data: &RelationData) -> Result<()>;
}
