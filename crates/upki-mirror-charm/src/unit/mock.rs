// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock unit for testing.
//!
//! Holds status, ports, leadership and relation databags in memory.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::status::{Port, UnitStatus};
use super::traits::{Databag, RelationData, Unit};
use crate::error::{Error, Result};

/// One relation as seen from this unit.
#[derive(Debug, Clone, Default)]
pub struct MockRelation {
    /// Endpoint name, e.g. `ingress`.
    pub endpoint: String,
    /// Remote application name.
    pub remote_app: Option<String>,
    /// Remote application databag.
    pub remote_app_data: RelationData,
    /// Remote unit databags.
    pub remote_units: BTreeMap<String, RelationData>,
    /// This application's databag.
    pub local_app_data: RelationData,
    /// This unit's databag.
    pub local_unit_data: RelationData,
}

#[derive(Debug)]
struct MockUnitState {
    statuses: Vec<UnitStatus>,
    ports: BTreeSet<Port>,
    leader: bool,
    relations: BTreeMap<String, MockRelation>,
}

/// Mock unit for testing.
pub struct MockUnit {
    unit_name: String,
    app_name: String,
    state: Mutex<MockUnitState>,
}

impl MockUnit {
    /// Create a leader unit named `unit_name`.
    pub fn new(unit_name: &str) -> Self {
        let app_name = unit_name
            .split_once('/')
            .map(|(app, _)| app)
            .unwrap_or(unit_name)
            .to_string();
        Self {
            unit_name: unit_name.to_string(),
            app_name,
            state: Mutex::new(MockUnitState {
                statuses: Vec::new(),
                ports: BTreeSet::new(),
                leader: true,
                relations: BTreeMap::new(),
            }),
        }
    }

    /// Set leadership.
    pub async fn set_leader(&self, leader: bool) {
        self.state.lock().await.leader = leader;
    }

    /// Pre-open a port, as left by an earlier hook.
    pub async fn preopen(&self, port: Port) {
        self.state.lock().await.ports.insert(port);
    }

    /// Register a relation under `relation_id`.
    pub async fn add_relation(&self, relation_id: &str, relation: MockRelation) {
        self.state
            .lock()
            .await
            .relations
            .insert(relation_id.to_string(), relation);
    }

    /// Latest status, `None` if never set.
    pub async fn status(&self) -> Option<UnitStatus> {
        self.state.lock().await.statuses.last().cloned()
    }

    /// Every status set, oldest first.
    pub async fn status_history(&self) -> Vec<UnitStatus> {
        self.state.lock().await.statuses.clone()
    }

    /// Currently opened ports.
    pub async fn ports(&self) -> BTreeSet<Port> {
        self.state.lock().await.ports.clone()
    }

    /// Snapshot of a relation.
    pub async fn relation(&self, relation_id: &str) -> Option<MockRelation> {
        self.state.lock().await.relations.get(relation_id).cloned()
    }

    fn unknown_relation(relation_id: &str) -> Error {
        Error::HookTool {
            tool: "relation-get".to_string(),
            exit_code: 2,
            stderr: format!("invalid value {relation_id:?} for option -r: relation not found"),
        }
    }
}

#[async_trait]
impl Unit for MockUnit {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        self.state.lock().await.statuses.push(status.clone());
        Ok(())
    }

    async fn open_port(&self, port: Port) -> Result<()> {
        self.state.lock().await.ports.insert(port);
        Ok(())
    }

    async fn close_port(&self, port: Port) -> Result<()> {
        self.state.lock().await.ports.remove(&port);
        Ok(())
    }

    async fn opened_ports(&self) -> Result<BTreeSet<Port>> {
        Ok(self.ports().await)
    }

    async fn is_leader(&self) -> Result<bool> {
        Ok(self.state.lock().await.leader)
    }

    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .relations
            .iter()
            .filter(|(_, r)| r.endpoint == endpoint)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn relation_units(&self, relation_id: &str) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let relation = state
            .relations
            .get(relation_id)
            .ok_or_else(|| Self::unknown_relation(relation_id))?;
        Ok(relation.remote_units.keys().cloned().collect())
    }

    async fn remote_app(&self, relation_id: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        let relation = state
            .relations
            .get(relation_id)
            .ok_or_else(|| Self::unknown_relation(relation_id))?;
        Ok(relation.remote_app.clone())
    }

    async fn relation_get(&self, relation_id: &str, bag: &Databag) -> Result<RelationData> {
        let state = self.state.lock().await;
        let relation = state
            .relations
            .get(relation_id)
            .ok_or_else(|| Self::unknown_relation(relation_id))?;

        let data = match bag {
            Databag::Unit(unit) if *unit == self.unit_name => Some(&relation.local_unit_data),
            Databag::App(app) if *app == self.app_name => Some(&relation.local_app_data),
            Databag::Unit(unit) => relation.remote_units.get(unit),
            Databag::App(app) if relation.remote_app.as_deref() == Some(app.as_str()) => {
                Some(&relation.remote_app_data)
            }
            Databag::App(_) => None,
        };
        Ok(data.cloned().unwrap_or_default())
    }

    async fn relation_set(&self, relation_id: &str, app: bool, data: &RelationData) -> Result<()> {
        let mut state = self.state.lock().await;
        let leader = state.leader;
        let relation = state
            .relations
            .get_mut(relation_id)
            .ok_or_else(|| Self::unknown_relation(relation_id))?;

        if app && !leader {
            return Err(Error::HookTool {
                tool: "relation-set".to_string(),
                exit_code: 1,
                stderr: "cannot write relation settings: not the leader".to_string(),
            });
        }

        let bag = if app {
            &mut relation.local_app_data
        } else {
            &mut relation.local_unit_data
        };
        for (key, value) in data {
            if value.is_empty() {
                bag.remove(key);
            } else {
                bag.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
