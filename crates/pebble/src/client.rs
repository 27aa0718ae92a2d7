// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pebble HTTP API client.
//!
//! Pebble serves a JSON API over a unix socket. Every request opens a fresh
//! HTTP/1.1 connection; the supervisor is local and requests are rare.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::http::Method;
use hyper::http::header::{CONTENT_TYPE, HOST};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::UnixStream;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::exec;
use crate::layer::Layer;
use crate::traits::{ExecOutput, ExecRequest, ServiceInfo, Supervisor};

/// Default directory holding one socket per workload container.
pub const DEFAULT_SOCKET_DIR: &str = "/charm/containers";

const MULTIPART_BOUNDARY: &str = "pebble-client-f0e1d2c3b4a59687";

/// Configuration for the Pebble client.
#[derive(Debug, Clone)]
pub struct PebbleClientConfig {
    /// Container name the socket belongs to.
    pub container: String,
    /// Path to the supervisor socket.
    pub socket_path: PathBuf,
    /// Server-side timeout when waiting on async changes.
    pub change_timeout: Duration,
}

impl PebbleClientConfig {
    /// Configuration for `container` under a socket directory laid out as
    /// `<dir>/<container>/pebble.socket`.
    pub fn for_container(socket_dir: impl AsRef<Path>, container: &str) -> Self {
        Self {
            container: container.to_string(),
            socket_path: socket_dir.as_ref().join(container).join("pebble.socket"),
            change_timeout: Duration::from_secs(30),
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "status-code", default)]
    status_code: u16,
    #[serde(default)]
    change: Option<String>,
    #[serde(default)]
    result: Value,
}

/// A change as returned by `/v1/changes/{id}/wait`.
#[derive(Debug, Deserialize)]
pub(crate) struct Change {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub err: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Task {
    #[serde(default)]
    pub data: serde_json::Map<String, Value>,
}

/// Client for one container's supervisor.
pub struct PebbleClient {
    config: PebbleClientConfig,
}

impl PebbleClient {
    /// Create a client from configuration.
    pub fn new(config: PebbleClientConfig) -> Self {
        Self { config }
    }

    pub(crate) fn unavailable(socket: &Path, err: impl std::fmt::Display) -> Error {
        Error::SupervisorUnavailable {
            socket: socket.display().to_string(),
            reason: err.to_string(),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<Envelope> {
        let stream = UnixStream::connect(&self.config.socket_path)
            .await
            .map_err(|e| Self::unavailable(&self.config.socket_path, e))?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "Pebble connection closed with error");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(body))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();

        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|_| Error::Api {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&bytes).trim().to_string(),
        })?;

        if envelope.kind == "error" || !status.is_success() {
            let message = envelope
                .result
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            let status = if envelope.status_code != 0 {
                envelope.status_code
            } else {
                status.as_u16()
            };
            return Err(Error::Api { status, message });
        }

        Ok(envelope)
    }

    async fn get(&self, path: &str) -> Result<Envelope> {
        self.request(Method::GET, path, "application/json", Bytes::new())
            .await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Envelope> {
        let body = Bytes::from(serde_json::to_vec(body)?);
        self.request(Method::POST, path, "application/json", body)
            .await
    }

    /// Wait for a change to become ready.
    pub(crate) async fn wait_change(&self, id: &str) -> Result<Change> {
        let path = format!(
            "/v1/changes/{}/wait?timeout={}s",
            id,
            self.config.change_timeout.as_secs()
        );
        let envelope = self.get(&path).await?;
        Ok(serde_json::from_value(envelope.result)?)
    }

    /// Wait for a change and fail unless it finished cleanly.
    async fn wait_change_done(&self, id: &str) -> Result<()> {
        let change = self.wait_change(id).await?;
        match change.err {
            Some(err) if !err.is_empty() => Err(Error::ChangeFailed { id: change.id, err }),
            _ => {
                debug!(change = %change.id, status = %change.status, "Change finished");
                Ok(())
            }
        }
    }

    /// Run a `/v1/services` action and wait for its change.
    async fn service_action(&self, action: &str, services: &[&str]) -> Result<()> {
        let body = json!({ "action": action, "services": services });
        let envelope = self.post_json("/v1/services", &body).await?;
        let change = Self::change_id(&envelope)?;
        self.wait_change_done(&change).await
    }

    fn change_id(envelope: &Envelope) -> Result<String> {
        envelope
            .change
            .clone()
            .ok_or_else(|| Error::Protocol("async response without change id".to_string()))
    }

    fn multipart_push(path: &str, content: &[u8], make_dirs: bool) -> Result<Bytes> {
        let request = json!({
            "action": "write",
            "files": [{
                "path": path,
                "make-dirs": make_dirs,
                "permissions": "644",
            }],
        });

        let mut body = Vec::with_capacity(content.len() + 512);
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"request\"\r\n\r\n");
        body.extend_from_slice(&serde_json::to_vec(&request)?);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{path}\"\r\n\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        Ok(Bytes::from(body))
    }
}

#[async_trait]
impl Supervisor for PebbleClient {
    fn container_name(&self) -> &str {
        &self.config.container
    }

    async fn can_connect(&self) -> bool {
        match self.get("/v1/system-info").await {
            Ok(_) => true,
            Err(e) => {
                debug!(container = %self.config.container, error = %e, "Pebble not reachable");
                false
            }
        }
    }

    #[instrument(skip(self, layer), fields(container = %self.config.container))]
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        let body = json!({
            "action": "add",
            "combine": combine,
            "label": label,
            "format": "yaml",
            "layer": layer.to_yaml()?,
        });
        self.post_json("/v1/layers", &body).await?;
        info!(
            label = %label,
            services = layer.services.len(),
            checks = layer.checks.len(),
            "Layer added"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(container = %self.config.container))]
    async fn replan(&self) -> Result<()> {
        self.service_action("replan", &[]).await?;
        info!("Replan complete");
        Ok(())
    }

    async fn services(&self, names: &[&str]) -> Result<Vec<ServiceInfo>> {
        let path = if names.is_empty() {
            "/v1/services".to_string()
        } else {
            format!("/v1/services?names={}", names.join(","))
        };
        let envelope = self.get(&path).await?;
        Ok(serde_json::from_value(envelope.result)?)
    }

    #[instrument(skip(self), fields(container = %self.config.container))]
    async fn restart(&self, services: &[&str]) -> Result<()> {
        self.service_action("restart", services).await?;
        info!(services = ?services, "Services restarted");
        Ok(())
    }

    #[instrument(skip(self), fields(container = %self.config.container))]
    async fn stop(&self, services: &[&str]) -> Result<()> {
        self.service_action("stop", services).await?;
        info!(services = ?services, "Services stopped");
        Ok(())
    }

    #[instrument(
        skip(self, request),
        fields(container = %self.config.container, command = ?request.command)
    )]
    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        let body = json!({
            "command": request.command,
            "environment": request.environment,
            "working-dir": request.working_dir,
            "split-stderr": true,
        });
        let envelope = self.post_json("/v1/exec", &body).await?;
        let change = Self::change_id(&envelope)?;
        let task_id = envelope
            .result
            .get("task-id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("exec response without task-id".to_string()))?
            .to_string();

        let (stdout, stderr) = exec::collect_output(&self.config.socket_path, &task_id).await?;

        let finished = self.wait_change(&change).await?;
        let exit_code = finished
            .tasks
            .first()
            .and_then(|t| t.data.get("exit-code"))
            .and_then(Value::as_i64);

        let exit_code = match (exit_code, finished.err) {
            (Some(code), _) => code as i32,
            (None, Some(err)) if !err.is_empty() => {
                return Err(Error::ChangeFailed {
                    id: finished.id,
                    err,
                });
            }
            (None, _) => -1,
        };

        if exit_code != 0 {
            warn!(exit_code, stderr = %stderr.trim(), "Command exited non-zero");
        } else {
            debug!("Command completed");
        }

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    #[instrument(
        skip(self, content),
        fields(container = %self.config.container, bytes = content.len())
    )]
    async fn push(&self, path: &str, content: &[u8], make_dirs: bool) -> Result<()> {
        let body = Self::multipart_push(path, content, make_dirs)?;
        let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
        let envelope = self
            .request(Method::POST, "/v1/files", &content_type, body)
            .await?;

        let failure = envelope
            .result
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|entry| entry.get("error"))
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str);
        if let Some(message) = failure {
            return Err(Error::Api {
                status: 200,
                message: message.to_string(),
            });
        }

        info!(path = %path, "File pushed");
        Ok(())
    }
}
