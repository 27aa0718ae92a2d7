// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! upki-mirror charm - Juju operator for the upki-mirror workload
//!
//! The workload container runs nginx serving `/var/www/html`, which the
//! `upki-mirror` binary fills with crlite filters and a `manifest.json`.
//! This crate is the operator: it is invoked once per hook, decides what the
//! workload should look like, and drives the container's Pebble supervisor
//! and the Juju hook tools to get there.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐      hook tools       ┌──────────────────────┐
//! │      Juju agent       │◄──────────────────────│                      │
//! │  (status, ports,      │                       │  upki-mirror-charm   │
//! │   relation data)      │──── dispatch ────────►│  (this crate)        │
//! └───────────────────────┘                       └──────────────────────┘
//!                                                            │
//!                                            Pebble API over │ unix socket
//!                                                            ▼
//!                                  ┌──────────────────────────────────────┐
//!                                  │   nginx container                    │
//!                                  │   upki-mirror service, up/fetch      │
//!                                  │   checks, promtail                   │
//!                                  └──────────────────────────────────────┘
//! ```
//!
//! # Events
//!
//! | Event | Action |
//! |-------|--------|
//! | `nginx-pebble-ready` | Reconcile the workload, then log forwarding |
//! | `config-changed` | Reconcile if the container is reachable |
//! | `upgrade-charm` | Reconcile if reachable, publish ingress request |
//! | `leader-elected`, `ingress-relation-*` | Publish ingress request |
//! | `log-proxy-relation-*` | Reconfigure log forwarding |
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `JUJU_UNIT_NAME` | required | Unit name, e.g. `upki-mirror/0` |
//! | `JUJU_MODEL_NAME` | required | Model name |
//! | `JUJU_DISPATCH_PATH` | program name | Hook being run |
//! | `JUJU_CHARM_HTTP_PROXY` | empty | Proxy for the fetch command |
//! | `JUJU_CHARM_HTTPS_PROXY` | empty | Proxy for the fetch command |
//! | `UPKI_PEBBLE_SOCKET_DIR` | `/charm/containers` | Pebble socket directory |
//! | `UPKI_PROMTAIL_BINARY` | `/opt/promtail/promtail` | Promtail in the workload |
//! | `RUST_LOG` | `upki_mirror_charm=info,pebble=info` | Log filter |

#![deny(missing_docs)]

pub mod charm;
pub mod config;
pub mod error;
pub mod event;
pub mod ingress;
pub mod log_proxy;
pub mod reconciler;
pub mod unit;

pub use charm::Charm;
pub use config::{Config, ConfigError, ProxyEnv};
pub use error::{Error, Result};
pub use event::{HookEvent, RelationPhase};
pub use reconciler::{Reconciler, Reconciliation};
