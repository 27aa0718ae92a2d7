// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock supervisor for testing.
//!
//! Keeps layers, service state, pushed files and exec requests in memory so
//! callers can be tested without a real container.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::layer::{Layer, Service, Startup};
use crate::traits::{ExecOutput, ExecRequest, ServiceInfo, ServiceStatus, Supervisor};

#[derive(Debug, Clone)]
struct RunningService {
    status: ServiceStatus,
    /// Definition the service was last started with.
    started_with: Service,
    starts: u32,
}

#[derive(Debug, Default)]
struct MockState {
    /// Layers in insertion order.
    layers: Vec<(String, Layer)>,
    services: BTreeMap<String, RunningService>,
    files: BTreeMap<String, Vec<u8>>,
    execs: HashMap<Vec<String>, ExecOutput>,
    exec_log: Vec<ExecRequest>,
    replans: u32,
}

/// Mock supervisor for testing.
pub struct MockSupervisor {
    container: String,
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<MockState>>,
}

impl MockSupervisor {
    /// Create a reachable mock for `container`.
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock whose supervisor never answers.
    pub fn unreachable(container: &str) -> Self {
        let mock = Self::new(container);
        mock.set_connected(false);
        mock
    }

    /// Toggle reachability.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Register the outcome for a command line.
    pub async fn expect_exec<I, S>(&self, command: I, output: ExecOutput)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = command.into_iter().map(Into::into).collect();
        self.state.lock().await.execs.insert(command, output);
    }

    /// Layer stored under `label`.
    pub async fn layer(&self, label: &str) -> Option<Layer> {
        self.state
            .lock()
            .await
            .layers
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, layer)| layer.clone())
    }

    /// Labels in insertion order.
    pub async fn layer_labels(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.layers.iter().map(|(l, _)| l.clone()).collect()
    }

    /// The combined plan across all layers.
    pub async fn plan(&self) -> Layer {
        Self::combined_plan(&self.state.lock().await.layers)
    }

    /// Status of every service that has been started at least once.
    pub async fn service_statuses(&self) -> BTreeMap<String, ServiceStatus> {
        let state = self.state.lock().await;
        state
            .services
            .iter()
            .map(|(name, s)| (name.clone(), s.status))
            .collect()
    }

    /// How many times `service` has been (re)started.
    pub async fn start_count(&self, service: &str) -> u32 {
        let state = self.state.lock().await;
        state.services.get(service).map(|s| s.starts).unwrap_or(0)
    }

    /// Number of replans issued.
    pub async fn replan_count(&self) -> u32 {
        self.state.lock().await.replans
    }

    /// Commands executed so far.
    pub async fn exec_log(&self) -> Vec<ExecRequest> {
        self.state.lock().await.exec_log.clone()
    }

    /// Content pushed to `path`.
    pub async fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().await.files.get(path).cloned()
    }

    fn combined_plan(layers: &[(String, Layer)]) -> Layer {
        let mut plan = Layer::default();
        for (_, layer) in layers {
            plan.combine(layer);
        }
        plan
    }

    fn unknown_service(name: &str) -> Error {
        Error::Api {
            status: 400,
            message: format!("service {name:?} does not exist"),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::SupervisorUnavailable {
                socket: self.container.clone(),
                reason: "mock supervisor unreachable".to_string(),
            })
        }
    }
}

#[async_trait]
impl Supervisor for MockSupervisor {
    fn container_name(&self) -> &str {
        &self.container
    }

    async fn can_connect(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;

        match state.layers.iter().position(|(l, _)| l == label) {
            Some(index) if combine => state.layers[index].1.combine(layer),
            Some(_) => {
                return Err(Error::Api {
                    status: 400,
                    message: format!("layer {label:?} already exists"),
                });
            }
            None => state.layers.push((label.to_string(), layer.clone())),
        }
        Ok(())
    }

    async fn replan(&self) -> Result<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;
        let plan = Self::combined_plan(&state.layers);

        for (name, service) in &plan.services {
            if service.startup != Some(Startup::Enabled) {
                continue;
            }
            let entry = state
                .services
                .entry(name.clone())
                .or_insert_with(|| RunningService {
                    status: ServiceStatus::Inactive,
                    started_with: service.clone(),
                    starts: 0,
                });
            let unchanged = entry.status == ServiceStatus::Active && entry.started_with == *service;
            if !unchanged {
                entry.status = ServiceStatus::Active;
                entry.started_with = service.clone();
                entry.starts += 1;
            }
        }
        state.replans += 1;
        Ok(())
    }

    async fn services(&self, names: &[&str]) -> Result<Vec<ServiceInfo>> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        let plan = Self::combined_plan(&state.layers);

        Ok(plan
            .services
            .iter()
            .filter(|(name, _)| names.is_empty() || names.contains(&name.as_str()))
            .map(|(name, service)| ServiceInfo {
                name: name.clone(),
                startup: service.startup.unwrap_or_default(),
                current: state
                    .services
                    .get(name)
                    .map(|s| s.status)
                    .unwrap_or(ServiceStatus::Inactive),
            })
            .collect())
    }

    async fn restart(&self, services: &[&str]) -> Result<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;
        let plan = Self::combined_plan(&state.layers);

        for name in services {
            let service = plan
                .services
                .get(*name)
                .ok_or_else(|| Self::unknown_service(name))?;
            let entry = state
                .services
                .entry(name.to_string())
                .or_insert_with(|| RunningService {
                    status: ServiceStatus::Inactive,
                    started_with: service.clone(),
                    starts: 0,
                });
            entry.status = ServiceStatus::Active;
            entry.started_with = service.clone();
            entry.starts += 1;
        }
        Ok(())
    }

    async fn stop(&self, services: &[&str]) -> Result<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;
        let plan = Self::combined_plan(&state.layers);

        for name in services {
            if !plan.services.contains_key(*name) {
                return Err(Self::unknown_service(name));
            }
            if let Some(running) = state.services.get_mut(*name) {
                running.status = ServiceStatus::Inactive;
            }
        }
        Ok(())
    }

    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;
        state.exec_log.push(request.clone());

        match state.execs.get(&request.command) {
            Some(output) => Ok(output.clone()),
            None => Err(Error::Api {
                status: 400,
                message: format!(
                    "cannot find executable {:?}",
                    request.command.first().cloned().unwrap_or_default()
                ),
            }),
        }
    }

    async fn push(&self, path: &str, content: &[u8], _make_dirs: bool) -> Result<()> {
        self.ensure_connected()?;
        self.state
            .lock()
            .await
            .files
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }
}
