// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log forwarding over the `loki_push_api` interface.
//!
//! Each Loki unit publishes its push endpoint in its unit databag as
//! `endpoint` = `{"url": ...}`. The nginx log files are tailed by a promtail
//! service inside the workload container, configured with one client per
//! endpoint.

use std::collections::BTreeMap;

use pebble::{Layer, Override, Service, Startup, Supervisor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::unit::{Databag, Unit};

/// Relation endpoint name.
pub const ENDPOINT: &str = "log-proxy";
/// Log files forwarded from the workload.
pub const LOG_FILES: [&str; 2] = ["/var/log/nginx/access.log", "/var/log/nginx/error.log"];
/// Where the promtail configuration is written in the workload.
pub const PROMTAIL_CONFIG_PATH: &str = "/etc/promtail/promtail_config.yaml";
/// Label of the promtail layer.
pub const PROMTAIL_LAYER: &str = "promtail";
/// Name of the promtail service.
pub const PROMTAIL_SERVICE: &str = "promtail";

const POSITIONS_PATH: &str = "/opt/promtail/positions.yaml";

#[derive(Debug, Deserialize)]
struct LokiEndpoint {
    url: String,
}

/// Juju topology attached to every forwarded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Model name.
    pub model: String,
    /// Application name.
    pub application: String,
    /// Unit name.
    pub unit: String,
}

#[derive(Debug, Serialize)]
struct PromtailConfig {
    server: ServerConfig,
    positions: PositionsConfig,
    clients: Vec<ClientConfig>,
    scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Serialize)]
struct ServerConfig {
    http_listen_port: u16,
    grpc_listen_port: u16,
}

#[derive(Debug, Serialize)]
struct PositionsConfig {
    filename: String,
}

#[derive(Debug, Serialize)]
struct ClientConfig {
    url: String,
}

#[derive(Debug, Serialize)]
struct ScrapeConfig {
    job_name: String,
    static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Serialize)]
struct StaticConfig {
    targets: Vec<String>,
    labels: BTreeMap<String, String>,
}

/// Consumer side of `loki_push_api`.
#[derive(Debug, Clone)]
pub struct LogProxyConsumer {
    topology: Topology,
    promtail_binary: String,
}

impl LogProxyConsumer {
    /// Create a consumer for `topology` running `promtail_binary`.
    pub fn new(topology: Topology, promtail_binary: impl Into<String>) -> Self {
        Self {
            topology,
            promtail_binary: promtail_binary.into(),
        }
    }

    /// Push endpoints published across all `log-proxy` relations, sorted and
    /// deduplicated.
    pub async fn endpoints(&self, unit: &dyn Unit) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for relation_id in unit.relation_ids(ENDPOINT).await? {
            for remote in unit.relation_units(&relation_id).await? {
                let data = unit
                    .relation_get(&relation_id, &Databag::Unit(remote.clone()))
                    .await?;
                let Some(raw) = data.get("endpoint") else {
                    continue;
                };
                match serde_json::from_str::<LokiEndpoint>(raw) {
                    Ok(endpoint) => urls.push(endpoint.url),
                    Err(e) => {
                        warn!(
                            relation = %relation_id,
                            unit = %remote,
                            error = %e,
                            "Ignoring malformed Loki endpoint"
                        );
                    }
                }
            }
        }
        urls.sort();
        urls.dedup();
        Ok(urls)
    }

    /// Render the promtail configuration for `endpoints`.
    pub fn render_config(&self, endpoints: &[String]) -> Result<String> {
        let job = format!("juju_{}_{}", self.topology.model, self.topology.application);
        let static_configs = LOG_FILES
            .iter()
            .map(|path| StaticConfig {
                targets: vec!["localhost".to_string()],
                labels: BTreeMap::from([
                    ("job".to_string(), job.clone()),
                    ("__path__".to_string(), path.to_string()),
                    ("juju_model".to_string(), self.topology.model.clone()),
                    (
                        "juju_application".to_string(),
                        self.topology.application.clone(),
                    ),
                    ("juju_unit".to_string(), self.topology.unit.clone()),
                ]),
            })
            .collect();

        let config = PromtailConfig {
            server: ServerConfig {
                http_listen_port: 9080,
                grpc_listen_port: 0,
            },
            positions: PositionsConfig {
                filename: POSITIONS_PATH.to_string(),
            },
            clients: endpoints
                .iter()
                .map(|url| ClientConfig { url: url.clone() })
                .collect(),
            scrape_configs: vec![ScrapeConfig {
                job_name: "system".to_string(),
                static_configs,
            }],
        };
        Ok(serde_yaml::to_string(&config)?)
    }

    /// Layer running promtail against the pushed configuration.
    pub fn promtail_layer(&self, startup: Startup) -> Layer {
        let service = Service {
            override_: Override::Replace,
            summary: "promtail".to_string(),
            command: format!(
                "{} -config.file={}",
                self.promtail_binary, PROMTAIL_CONFIG_PATH
            ),
            startup: Some(startup),
            ..Default::default()
        };
        Layer {
            services: BTreeMap::from([(PROMTAIL_SERVICE.to_string(), service)]),
            ..Default::default()
        }
    }

    /// Configure forwarding for the current set of endpoints.
    ///
    /// Returns the endpoints configured. Only the promtail service is
    /// started or stopped here; the workload service is left alone. When
    /// the last endpoint goes away promtail is disabled and stopped.
    pub async fn reconcile(
        &self,
        supervisor: &dyn Supervisor,
        unit: &dyn Unit,
    ) -> Result<Vec<String>> {
        let endpoints = self.endpoints(unit).await?;
        if !supervisor.can_connect().await {
            if !endpoints.is_empty() {
                info!("Workload container not ready; log forwarding configured on pebble-ready");
            }
            return Ok(Vec::new());
        }
        if endpoints.is_empty() {
            self.stop_forwarding(supervisor).await?;
            return Ok(endpoints);
        }

        let config = self.render_config(&endpoints)?;
        supervisor
            .push(PROMTAIL_CONFIG_PATH, config.as_bytes(), true)
            .await?;
        supervisor
            .add_layer(PROMTAIL_LAYER, &self.promtail_layer(Startup::Enabled), true)
            .await?;
        // Restart so a running promtail picks up the new client list
        supervisor.restart(&[PROMTAIL_SERVICE]).await?;

        info!(endpoints = endpoints.len(), files = ?LOG_FILES, "Log forwarding configured");
        Ok(endpoints)
    }

    async fn stop_forwarding(&self, supervisor: &dyn Supervisor) -> Result<()> {
        let services = supervisor.services(&[PROMTAIL_SERVICE]).await?;
        let Some(promtail) = services.first() else {
            debug!("No Loki endpoints; log forwarding idle");
            return Ok(());
        };
        if promtail.startup == Startup::Disabled && !promtail.is_active() {
            return Ok(());
        }

        // Disabled so a later replan does not bring it back
        supervisor
            .add_layer(PROMTAIL_LAYER, &self.promtail_layer(Startup::Disabled), true)
            .await?;
        if promtail.is_active() {
            supervisor.stop(&[PROMTAIL_SERVICE]).await?;
        }
        info!("Last Loki endpoint removed; log forwarding stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{MockRelation, MockUnit, RelationData};
    use pebble::{MockSupervisor, ServiceStatus};

    const LOKI_0: &str = r#"{"url": "http://loki-0:3100/loki/api/v1/push"}"#;

    fn consumer() -> LogProxyConsumer {
        LogProxyConsumer::new(
            Topology {
                model: "pki".to_string(),
                application: "upki-mirror".to_string(),
                unit: "upki-mirror/0".to_string(),
            },
            "/opt/promtail/promtail",
        )
    }

    fn loki_relation(units: &[(&str, &str)]) -> MockRelation {
        MockRelation {
            endpoint: ENDPOINT.to_string(),
            remote_app: Some("loki".to_string()),
            remote_units: units
                .iter()
                .map(|(unit, endpoint)| {
                    (
                        unit.to_string(),
                        RelationData::from([("endpoint".to_string(), endpoint.to_string())]),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    async fn related_unit(units: &[(&str, &str)]) -> MockUnit {
        let unit = MockUnit::new("upki-mirror/0");
        unit.add_relation("log-proxy:2", loki_relation(units)).await;
        unit
    }

    #[test]
    fn test_render_config() {
        let yaml = consumer()
            .render_config(&["http://loki-0:3100/loki/api/v1/push".to_string()])
            .unwrap();

        assert!(yaml.contains("url: http://loki-0:3100/loki/api/v1/push"));
        assert!(yaml.contains("__path__: /var/log/nginx/access.log"));
        assert!(yaml.contains("__path__: /var/log/nginx/error.log"));
        assert!(yaml.contains("juju_unit: upki-mirror/0"));
        assert!(yaml.contains("job: juju_pki_upki-mirror"));
    }

    #[tokio::test]
    async fn test_endpoints_skip_malformed_and_dedup() {
        let unit = related_unit(&[
            ("loki/0", LOKI_0),
            ("loki/1", "garbage"),
            ("loki/2", LOKI_0),
        ])
        .await;

        let endpoints = consumer().endpoints(&unit).await.unwrap();

        assert_eq!(endpoints, vec!["http://loki-0:3100/loki/api/v1/push"]);
    }

    #[tokio::test]
    async fn test_reconcile_pushes_config_and_layer() {
        let unit = related_unit(&[("loki/0", LOKI_0)]).await;
        let supervisor = MockSupervisor::new("nginx");

        let endpoints = consumer().reconcile(&supervisor, &unit).await.unwrap();

        assert_eq!(endpoints.len(), 1);
        let config = supervisor.file(PROMTAIL_CONFIG_PATH).await.unwrap();
        assert!(String::from_utf8(config).unwrap().contains("loki-0"));
        let layer = supervisor.layer(PROMTAIL_LAYER).await.unwrap();
        assert_eq!(
            layer.services["promtail"].command,
            "/opt/promtail/promtail -config.file=/etc/promtail/promtail_config.yaml"
        );
        let statuses = supervisor.service_statuses().await;
        assert_eq!(statuses["promtail"], ServiceStatus::Active);
        assert_eq!(supervisor.replan_count().await, 0);
    }

    #[tokio::test]
    async fn test_reconcile_restarts_promtail_on_new_endpoint() {
        let unit = related_unit(&[("loki/0", LOKI_0)]).await;
        let supervisor = MockSupervisor::new("nginx");
        consumer().reconcile(&supervisor, &unit).await.unwrap();

        let loki_1 = r#"{"url": "http://loki-1:3100/loki/api/v1/push"}"#;
        let both = loki_relation(&[("loki/0", LOKI_0), ("loki/1", loki_1)]);
        unit.add_relation("log-proxy:2", both).await;
        let endpoints = consumer().reconcile(&supervisor, &unit).await.unwrap();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(supervisor.start_count("promtail").await, 2);
    }

    #[tokio::test]
    async fn test_reconcile_stops_promtail_when_last_endpoint_leaves() {
        let unit = related_unit(&[("loki/0", LOKI_0)]).await;
        let supervisor = MockSupervisor::new("nginx");
        consumer().reconcile(&supervisor, &unit).await.unwrap();

        let departed = loki_relation(&[]);
        unit.add_relation("log-proxy:2", departed).await;
        let endpoints = consumer().reconcile(&supervisor, &unit).await.unwrap();

        assert!(endpoints.is_empty());
        let statuses = supervisor.service_statuses().await;
        assert_eq!(statuses["promtail"], ServiceStatus::Inactive);
        let layer = supervisor.layer(PROMTAIL_LAYER).await.unwrap();
        assert_eq!(layer.services["promtail"].startup, Some(Startup::Disabled));

        // A later replan must not bring it back
        supervisor.replan().await.unwrap();
        let statuses = supervisor.service_statuses().await;
        assert_eq!(statuses["promtail"], ServiceStatus::Inactive);
    }

    #[tokio::test]
    async fn test_reconcile_without_endpoints_is_idle() {
        let unit = MockUnit::new("upki-mirror/0");
        let supervisor = MockSupervisor::new("nginx");

        let endpoints = consumer().reconcile(&supervisor, &unit).await.unwrap();

        assert!(endpoints.is_empty());
        assert!(supervisor.layer_labels().await.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_waits_for_container() {
        let unit = related_unit(&[("loki/0", LOKI_0)]).await;
        let supervisor = MockSupervisor::unreachable("nginx");

        let endpoints = consumer().reconcile(&supervisor, &unit).await.unwrap();

        assert!(endpoints.is_empty());
    }
}
