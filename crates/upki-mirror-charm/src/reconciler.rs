// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workload reconciliation.
//!
//! Runs when the workload container becomes ready:
//!
//! ```text
//! add_layer("nginx", combine) ──► exec upki-mirror ──► plan()
//!                                                        │
//!                  exit 0 ◄──────────────────────────────┴─────► exit != 0
//!                    │                                              │
//!      replan, open 80/tcp, Active                  stop upki-mirror, close 80/tcp,
//!                                                   Blocked("Initial mirror fetch failed")
//! ```
//!
//! [`plan`] holds the only decision and is pure; [`Reconciler`] performs the
//! supervisor and unit calls around it. Every step converges to the same end
//! state when repeated with the same inputs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pebble::{
    Check, CheckLevel, ExecCheck, ExecOutput, ExecRequest, Layer, Override, Service, Startup,
    Supervisor, TcpCheck,
};
use tracing::{info, warn};

use crate::config::ProxyEnv;
use crate::error::Result;
use crate::unit::{Port, Unit, UnitStatus};

/// Workload container name.
pub const CONTAINER: &str = "nginx";
/// Label the layer is added under.
pub const LAYER_LABEL: &str = "nginx";
/// Name of the web service.
pub const SERVICE_NAME: &str = "upki-mirror";
/// Command that serves the mirror.
pub const SERVICE_COMMAND: &str = "nginx -g 'daemon off;'";
/// The fetch binary and its output directory.
pub const FETCH_COMMAND: [&str; 2] = ["/bin/upki-mirror", "/var/www/html"];
/// Interval of the recurring fetch check.
pub const FETCH_PERIOD: &str = "360m";
/// Interval of the liveness check.
pub const UP_PERIOD: &str = "30s";
/// Port nginx listens on.
pub const HTTP_PORT: u16 = 80;
/// Status message after a failed bootstrap fetch.
pub const FETCH_FAILED_MESSAGE: &str = "Initial mirror fetch failed";
/// Status message while the bootstrap fetch runs.
pub const FETCHING_MESSAGE: &str = "Fetching initial mirror";

/// Environment handed to the fetch command. Both keys are always present.
pub fn proxy_environment(proxy: &ProxyEnv) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("HTTP_PROXY".to_string(), proxy.http_proxy.clone()),
        ("HTTPS_PROXY".to_string(), proxy.https_proxy.clone()),
    ])
}

/// The layer declared for the workload.
pub fn desired_layer(proxy: &ProxyEnv) -> Layer {
    let service = Service {
        override_: Override::Replace,
        summary: "nginx".to_string(),
        command: SERVICE_COMMAND.to_string(),
        startup: Some(Startup::Enabled),
        ..Default::default()
    };

    let up = Check {
        override_: Override::Replace,
        level: Some(CheckLevel::Alive),
        period: Some(UP_PERIOD.to_string()),
        startup: Some(Startup::Enabled),
        tcp: Some(TcpCheck {
            port: HTTP_PORT,
            host: None,
        }),
        ..Default::default()
    };

    let fetch = Check {
        override_: Override::Replace,
        level: Some(CheckLevel::Alive),
        period: Some(FETCH_PERIOD.to_string()),
        startup: Some(Startup::Enabled),
        exec: Some(ExecCheck {
            command: FETCH_COMMAND.join(" "),
            environment: proxy_environment(proxy),
            working_dir: None,
        }),
        ..Default::default()
    };

    Layer {
        services: BTreeMap::from([(SERVICE_NAME.to_string(), service)]),
        checks: BTreeMap::from([("up".to_string(), up), ("fetch".to_string(), fetch)]),
        ..Default::default()
    }
}

/// The one-shot bootstrap fetch.
pub fn fetch_request(proxy: &ProxyEnv) -> ExecRequest {
    ExecRequest::new(FETCH_COMMAND).with_environment(proxy_environment(proxy))
}

/// Desired end state of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Layer applied to the supervisor.
    pub layer: Layer,
    /// Ports the unit should expose.
    pub ports: BTreeSet<Port>,
    /// Status to report.
    pub status: UnitStatus,
    /// Whether services should be started.
    pub replan: bool,
}

/// Decide the end state from the proxy settings and the bootstrap fetch.
pub fn plan(proxy: &ProxyEnv, fetch: &ExecOutput) -> Reconciliation {
    let layer = desired_layer(proxy);
    if fetch.success() {
        Reconciliation {
            layer,
            ports: BTreeSet::from([Port::tcp(HTTP_PORT)]),
            status: UnitStatus::Active,
            replan: true,
        }
    } else {
        Reconciliation {
            layer,
            ports: BTreeSet::new(),
            status: UnitStatus::Blocked(FETCH_FAILED_MESSAGE.to_string()),
            replan: false,
        }
    }
}

/// Applies a [`Reconciliation`] to the supervisor and the unit.
pub struct Reconciler {
    supervisor: Arc<dyn Supervisor>,
    unit: Arc<dyn Unit>,
    proxy: ProxyEnv,
}

impl Reconciler {
    /// Create a reconciler.
    pub fn new(supervisor: Arc<dyn Supervisor>, unit: Arc<dyn Unit>, proxy: ProxyEnv) -> Self {
        Self {
            supervisor,
            unit,
            proxy,
        }
    }

    /// Run one reconciliation.
    ///
    /// Fails only when the supervisor or the platform cannot be reached; a
    /// failed fetch ends in a Blocked status and `Ok`, with the web service
    /// stopped if an earlier run had started it.
    pub async fn reconcile(&self) -> Result<Reconciliation> {
        let layer = desired_layer(&self.proxy);
        self.supervisor.add_layer(LAYER_LABEL, &layer, true).await?;

        self.unit
            .set_status(&UnitStatus::Maintenance(FETCHING_MESSAGE.to_string()))
            .await?;
        let fetch = self.bootstrap_fetch().await?;
        let reconciliation = plan(&self.proxy, &fetch);

        if reconciliation.replan {
            self.supervisor.replan().await?;
            info!(service = SERVICE_NAME, "Workload started");
        } else {
            warn!(
                exit_code = fetch.exit_code,
                stderr = %fetch.stderr.trim(),
                "Bootstrap fetch failed; mirror not exposed"
            );
            self.stop_workload().await?;
        }

        self.converge_ports(&reconciliation.ports).await?;
        self.unit.set_status(&reconciliation.status).await?;

        info!(status = %reconciliation.status, "Reconciliation complete");
        Ok(reconciliation)
    }

    /// Run the fetch once.
    ///
    /// API errors from the exec itself (missing binary, bad working dir) are
    /// folded into a failed result; only an unreachable supervisor is fatal.
    async fn bootstrap_fetch(&self) -> Result<ExecOutput> {
        match self.supervisor.exec(&fetch_request(&self.proxy)).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_unavailable() => Err(e.into()),
            Err(e) => Ok(ExecOutput::exited(-1, e.to_string())),
        }
    }

    async fn stop_workload(&self) -> Result<()> {
        let services = self.supervisor.services(&[SERVICE_NAME]).await?;
        if services.iter().any(|s| s.is_active()) {
            self.supervisor.stop(&[SERVICE_NAME]).await?;
            info!(service = SERVICE_NAME, "Workload stopped");
        }
        Ok(())
    }

    async fn converge_ports(&self, desired: &BTreeSet<Port>) -> Result<()> {
        let opened = self.unit.opened_ports().await?;
        for port in desired.difference(&opened) {
            self.unit.open_port(*port).await?;
            info!(port = %port, "Port opened");
        }
        for port in opened.difference(desired) {
            self.unit.close_port(*port).await?;
            info!(port = %port, "Port closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn proxies() -> ProxyEnv {
        ProxyEnv {
            http_proxy: "http://squid.internal:3128".to_string(),
            https_proxy: "http://squid.internal:3129".to_string(),
        }
    }

    #[test]
    fn test_desired_layer_shape() {
        let layer = desired_layer(&ProxyEnv::default());

        let service = &layer.services[SERVICE_NAME];
        assert_eq!(service.override_, Override::Replace);
        assert_eq!(service.command, "nginx -g 'daemon off;'");
        assert_eq!(service.startup, Some(Startup::Enabled));

        let up = &layer.checks["up"];
        assert_eq!(up.level, Some(CheckLevel::Alive));
        assert_eq!(up.period_duration(), Some(Duration::from_secs(30)));
        assert_eq!(up.tcp.as_ref().map(|t| t.port), Some(80));

        let fetch = &layer.checks["fetch"];
        assert_eq!(fetch.period_duration(), Some(Duration::from_secs(360 * 60)));
        assert_eq!(
            fetch.exec.as_ref().map(|e| e.command.as_str()),
            Some("/bin/upki-mirror /var/www/html")
        );
    }

    #[test]
    fn test_absent_proxies_serialize_as_empty_strings() {
        let yaml = desired_layer(&ProxyEnv::default()).to_yaml().unwrap();

        assert!(yaml.contains("HTTP_PROXY: ''"), "{yaml}");
        assert!(yaml.contains("HTTPS_PROXY: ''"), "{yaml}");
        assert!(!yaml.contains("null"));
    }

    #[test]
    fn test_proxies_flow_into_fetch_check() {
        let layer = desired_layer(&proxies());
        let env = &layer.checks["fetch"].exec.as_ref().unwrap().environment;

        assert_eq!(env["HTTP_PROXY"], "http://squid.internal:3128");
        assert_eq!(env["HTTPS_PROXY"], "http://squid.internal:3129");
        assert_eq!(fetch_request(&proxies()).environment, *env);
    }

    #[test]
    fn test_desired_layer_is_deterministic() {
        let first = desired_layer(&proxies()).to_yaml().unwrap();
        let second = desired_layer(&proxies()).to_yaml().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_plan_success() {
        let reconciliation = plan(&ProxyEnv::default(), &ExecOutput::exited(0, ""));

        assert_eq!(reconciliation.ports, BTreeSet::from([Port::tcp(80)]));
        assert_eq!(reconciliation.status, UnitStatus::Active);
        assert!(reconciliation.replan);
    }

    #[test]
    fn test_plan_failure() {
        let reconciliation = plan(
            &ProxyEnv::default(),
            &ExecOutput::exited(1, "Failed to fetch mirror"),
        );

        assert!(reconciliation.ports.is_empty());
        assert_eq!(
            reconciliation.status,
            UnitStatus::Blocked("Initial mirror fetch failed".to_string())
        );
        assert!(!reconciliation.replan);
    }

    #[test]
    fn test_plan_layer_independent_of_outcome() {
        let ok = plan(&proxies(), &ExecOutput::exited(0, ""));
        let failed = plan(&proxies(), &ExecOutput::exited(2, "boom"));
        assert_eq!(ok.layer, failed.layer);
    }
}
