// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event routing.

use std::sync::Arc;

use pebble::Supervisor;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::event::HookEvent;
use crate::ingress::{self, IngressRequirer};
use crate::log_proxy::{self, LogProxyConsumer, Topology};
use crate::reconciler::{CONTAINER, Reconciler};
use crate::unit::{Unit, UnitStatus};

/// Status shown while the workload container is not reachable.
pub const WAITING_FOR_PEBBLE: &str = "Waiting for Pebble";

/// The charm: one hook invocation's worth of state.
pub struct Charm {
    config: Config,
    supervisor: Arc<dyn Supervisor>,
    unit: Arc<dyn Unit>,
}

impl Charm {
    /// Create a charm over the given supervisor and unit.
    pub fn new(config: Config, supervisor: Arc<dyn Supervisor>, unit: Arc<dyn Unit>) -> Self {
        Self {
            config,
            supervisor,
            unit,
        }
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.supervisor.clone(),
            self.unit.clone(),
            self.config.proxy.clone(),
        )
    }

    fn ingress(&self) -> IngressRequirer {
        IngressRequirer::new(&self.config.app_name, &self.config.model_name)
    }

    fn log_proxy(&self) -> LogProxyConsumer {
        LogProxyConsumer::new(
            Topology {
                model: self.config.model_name.clone(),
                application: self.config.app_name.clone(),
                unit: self.config.unit_name.clone(),
            },
            self.config.promtail_binary.clone(),
        )
    }

    /// Handle one hook event.
    #[instrument(skip(self), fields(unit = %self.config.unit_name))]
    pub async fn dispatch(&self, event: &HookEvent) -> Result<()> {
        match event {
            HookEvent::PebbleReady { container } if container == CONTAINER => {
                self.reconciler().reconcile().await?;
                self.forward_logs().await?;
            }
            HookEvent::UpgradeCharm | HookEvent::ConfigChanged => {
                self.reconcile_if_ready().await?;
                if *event == HookEvent::UpgradeCharm {
                    self.ingress().publish(self.unit.as_ref()).await?;
                }
            }
            HookEvent::LeaderElected => {
                self.ingress().publish(self.unit.as_ref()).await?;
            }
            HookEvent::Relation { endpoint, .. } if endpoint == ingress::ENDPOINT => {
                self.ingress().publish(self.unit.as_ref()).await?;
            }
            HookEvent::Relation { endpoint, .. } if endpoint == log_proxy::ENDPOINT => {
                self.forward_logs().await?;
            }
            other => debug!(event = %other, "Nothing to do"),
        }
        Ok(())
    }

    async fn reconcile_if_ready(&self) -> Result<()> {
        if self.supervisor.can_connect().await {
            self.reconciler().reconcile().await?;
        } else {
            info!(container = CONTAINER, "Workload container not reachable");
            self.unit
                .set_status(&UnitStatus::Waiting(WAITING_FOR_PEBBLE.to_string()))
                .await?;
        }
        Ok(())
    }

    async fn forward_logs(&self) -> Result<()> {
        self.log_proxy()
            .reconcile(self.supervisor.as_ref(), self.unit.as_ref())
            .await?;
        Ok(())
    }
}
