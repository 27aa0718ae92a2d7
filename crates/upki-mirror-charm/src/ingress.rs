// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingress requirer (`ingress` interface, v2).
//!
//! The leader publishes the per-application request in the application
//! databag; every unit publishes its host in its own databag. All values are
//! JSON-encoded strings. The provider answers with `ingress` =
//! `{"url": ...}` in its application databag.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::unit::{Databag, RelationData, Unit};

/// Relation endpoint name.
pub const ENDPOINT: &str = "ingress";

/// Per-application ingress request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRequirer {
    /// Application name.
    pub app: String,
    /// Model name.
    pub model: String,
    /// Port the service listens on.
    pub port: u16,
    /// Whether the proxy strips the routing prefix.
    pub strip_prefix: bool,
    /// Whether the proxy redirects http to https.
    pub redirect_https: bool,
}

#[derive(Debug, Deserialize)]
struct ProviderIngress {
    url: String,
}

fn encode(value: impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string(&value)?)
}

impl IngressRequirer {
    /// Request for `app` in `model` on port 80 with prefix stripping.
    pub fn new(app: &str, model: &str) -> Self {
        Self {
            app: app.to_string(),
            model: model.to_string(),
            port: 80,
            strip_prefix: true,
            redirect_https: false,
        }
    }

    /// Cluster-internal hostname of the application.
    pub fn host(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.app, self.model)
    }

    /// Application databag content.
    pub fn app_data(&self) -> Result<RelationData> {
        Ok(RelationData::from([
            ("model".to_string(), encode(&self.model)?),
            ("name".to_string(), encode(&self.app)?),
            ("port".to_string(), encode(self.port)?),
            ("strip-prefix".to_string(), encode(self.strip_prefix)?),
            ("redirect-https".to_string(), encode(self.redirect_https)?),
            ("scheme".to_string(), encode("http")?),
        ]))
    }

    /// Unit databag content.
    pub fn unit_data(&self) -> Result<RelationData> {
        Ok(RelationData::from([("host".to_string(), encode(self.host())?)]))
    }

    /// Publish the request on every `ingress` relation.
    pub async fn publish(&self, unit: &dyn Unit) -> Result<()> {
        let relations = unit.relation_ids(ENDPOINT).await?;
        if relations.is_empty() {
            debug!("No ingress relation");
            return Ok(());
        }

        let leader = unit.is_leader().await?;
        for relation_id in &relations {
            if leader {
                unit.relation_set(relation_id, true, &self.app_data()?)
                    .await?;
            }
            unit.relation_set(relation_id, false, &self.unit_data()?)
                .await?;
            info!(relation = %relation_id, host = %self.host(), leader, "Ingress requested");

            if let Some(url) = self.url(unit, relation_id).await? {
                info!(relation = %relation_id, url = %url, "Ingress ready");
            }
        }
        Ok(())
    }

    /// URL the provider published, if any.
    pub async fn url(&self, unit: &dyn Unit, relation_id: &str) -> Result<Option<String>> {
        let Some(provider) = unit.remote_app(relation_id).await? else {
            return Ok(None);
        };
        let data = unit
            .relation_get(relation_id, &Databag::App(provider))
            .await?;
        let Some(raw) = data.get("ingress") else {
            return Ok(None);
        };
        match serde_json::from_str::<ProviderIngress>(raw) {
            Ok(ingress) => Ok(Some(ingress.url)),
            Err(e) => {
                warn!(relation = %relation_id, error = %e, "Ignoring malformed ingress data");
                Ok(None)
            }
        }
    }
}
