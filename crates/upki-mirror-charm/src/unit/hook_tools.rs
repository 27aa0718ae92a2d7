// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Juju hook tool backend.
//!
//! Every operation runs one hook tool (`status-set`, `open-port`,
//! `relation-get`, ...) as a child process. Tools that support it are asked
//! for `--format=json` output.

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::status::{Port, UnitStatus};
use super::traits::{Databag, RelationData, Unit};
use crate::error::{Error, Result};

/// Unit backed by the hook tools on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct HookTools {
    /// Directory to resolve tools from instead of `PATH`.
    tools_dir: Option<PathBuf>,
}

impl HookTools {
    /// Resolve tools from `PATH`, as set up by the Juju agent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve tools from a fixed directory.
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
        }
    }

    fn command(&self, tool: &str) -> Command {
        match &self.tools_dir {
            Some(dir) => Command::new(dir.join(tool)),
            None => Command::new(tool),
        }
    }

    /// Run a tool and return its stdout.
    async fn run(&self, tool: &str, args: &[String]) -> Result<Vec<u8>> {
        debug!(tool = %tool, args = ?args, "Running hook tool");
        let output = self.command(tool).args(args).output().await?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(tool = %tool, exit_code = exit_code, stderr = %stderr, "Hook tool failed");
            return Err(Error::HookTool {
                tool: tool.to_string(),
                exit_code,
                stderr,
            });
        }

        Ok(output.stdout)
    }

    /// Run a tool with `--format=json` and decode its output.
    ///
    /// Empty output decodes as JSON `null`.
    async fn run_json<T: DeserializeOwned>(&self, tool: &str, mut args: Vec<String>) -> Result<T> {
        args.push("--format=json".to_string());
        let stdout = self.run(tool, &args).await?;
        let text = String::from_utf8_lossy(&stdout);
        let text = text.trim();
        let text = if text.is_empty() { "null" } else { text };
        Ok(serde_json::from_str(text)?)
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl Unit for HookTools {
    async fn set_status(&self, status: &UnitStatus) -> Result<()> {
        self.run("status-set", &args([status.name(), status.message()]))
            .await?;
        Ok(())
    }

    async fn open_port(&self, port: Port) -> Result<()> {
        self.run("open-port", &[port.to_string()]).await?;
        Ok(())
    }

    async fn close_port(&self, port: Port) -> Result<()> {
        self.run("close-port", &[port.to_string()]).await?;
        Ok(())
    }

    async fn opened_ports(&self) -> Result<BTreeSet<Port>> {
        let ports: Option<Vec<String>> = self.run_json("opened-ports", Vec::new()).await?;
        Ok(ports
            .unwrap_or_default()
            .iter()
            .filter_map(|p| match p.parse::<Port>() {
                Ok(port) => Some(port),
                Err(e) => {
                    warn!(port = %p, error = %e, "Ignoring opened port");
                    None
                }
            })
            .collect())
    }

    async fn is_leader(&self) -> Result<bool> {
        self.run_json("is-leader", Vec::new()).await
    }

    async fn relation_ids(&self, endpoint: &str) -> Result<Vec<String>> {
        let ids: Option<Vec<String>> = self.run_json("relation-ids", args([endpoint])).await?;
        Ok(ids.unwrap_or_default())
    }

    async fn relation_units(&self, relation_id: &str) -> Result<Vec<String>> {
        let units: Option<Vec<String>> = self
            .run_json("relation-list", args(["-r", relation_id]))
            .await?;
        Ok(units.unwrap_or_default())
    }

    async fn remote_app(&self, relation_id: &str) -> Result<Option<String>> {
        let app: Option<String> = self
            .run_json("relation-list", args(["-r", relation_id, "--app"]))
            .await?;
        Ok(app.filter(|a| !a.is_empty()))
    }

    async fn relation_get(&self, relation_id: &str, bag: &Databag) -> Result<RelationData> {
        let mut argv = args(["-r", relation_id]);
        let target = match bag {
            Databag::Unit(unit) => unit,
            Databag::App(app) => {
                argv.push("--app".to_string());
                app
            }
        };
        argv.push("-".to_string());
        argv.push(target.clone());

        let data: Option<RelationData> = self.run_json("relation-get", argv).await?;
        Ok(data.unwrap_or_default())
    }

    async fn relation_set(&self, relation_id: &str, app: bool, data: &RelationData) -> Result<()> {
        let mut argv = args(["-r", relation_id]);
        if app {
            argv.push("--app".to_string());
        }
        argv.extend(data.iter().map(|(k, v)| format!("{k}={v}")));
        self.run("relation-set", &argv).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Install a fake tool that records its argv and prints `stdout`.
    fn fake_tool(dir: &TempDir, name: &str, stdout: &str, exit_code: i32) {
        let log = dir.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\necho \"{name} $*\" >> '{}'\n\
             printf '%s' '{stdout}'\necho 'tool stderr' >&2\nexit {exit_code}\n",
            log.display()
        );
        let path = dir.path().join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn calls(dir: &TempDir) -> String {
        std::fs::read_to_string(dir.path().join("calls.log")).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_status_set_args() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "status-set", "", 0);
        let tools = HookTools::with_tools_dir(dir.path());

        let status = UnitStatus::Blocked("Initial mirror fetch failed".to_string());
        tools.set_status(&status).await.unwrap();

        assert_eq!(calls(&dir), "status-set blocked Initial mirror fetch failed\n");
    }

    #[tokio::test]
    async fn test_open_port_args() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "open-port", "", 0);
        let tools = HookTools::with_tools_dir(dir.path());

        tools.open_port(Port::tcp(80)).await.unwrap();

        assert_eq!(calls(&dir), "open-port 80/tcp\n");
    }

    #[tokio::test]
    async fn test_opened_ports_parses_json() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "opened-ports", r#"["80/tcp"]"#, 0);
        let tools = HookTools::with_tools_dir(dir.path());

        let ports = tools.opened_ports().await.unwrap();

        assert_eq!(ports, BTreeSet::from([Port::tcp(80)]));
        assert_eq!(calls(&dir), "opened-ports --format=json\n");
    }

    #[tokio::test]
    async fn test_relation_get_app_bag() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "relation-get", r#"{"ingress":"{\"url\": \"http://x/\"}"}"#, 0);
        let tools = HookTools::with_tools_dir(dir.path());

        let data = tools
            .relation_get("ingress:3", &Databag::App("traefik".to_string()))
            .await
            .unwrap();

        assert_eq!(data["ingress"], r#"{"url": "http://x/"}"#);
        assert_eq!(
            calls(&dir),
            "relation-get -r ingress:3 --app - traefik --format=json\n"
        );
    }

    #[tokio::test]
    async fn test_relation_ids_empty_output() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "relation-ids", "", 0);
        let tools = HookTools::with_tools_dir(dir.path());

        assert!(tools.relation_ids("ingress").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_tool_reports_stderr() {
        let dir = TempDir::new().unwrap();
        fake_tool(&dir, "is-leader", "", 2);
        let tools = HookTools::with_tools_dir(dir.path());

        let err = tools.is_leader().await.unwrap_err();

        match err {
            Error::HookTool {
                tool,
                exit_code,
                stderr,
            } => {
                assert_eq!(tool, "is-leader");
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "tool stderr");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
