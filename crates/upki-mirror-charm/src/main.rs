// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! upki-mirror charm entry point
//!
//! Invoked by `dispatch` once per hook. Exits non-zero when the hook should
//! be retried, e.g. when Pebble is not reachable yet.

use std::sync::Arc;
use tracing::{debug, info};

use pebble::{PebbleClient, PebbleClientConfig};
use upki_mirror_charm::reconciler::CONTAINER;
use upki_mirror_charm::unit::HookTools;
use upki_mirror_charm::{Charm, Config, HookEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Juju captures stderr into the unit log
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upki_mirror_charm=info,pebble=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Local runs outside a Juju agent can supply the environment from .env
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    let event = match &config.dispatch_path {
        Some(path) => HookEvent::from_dispatch_path(path),
        None => {
            let program = std::env::args().next().unwrap_or_default();
            HookEvent::from_dispatch_path(&program)
        }
    };

    info!(
        unit = %config.unit_name,
        model = %config.model_name,
        event = %event,
        "Dispatching hook"
    );

    let supervisor = Arc::new(PebbleClient::new(PebbleClientConfig::for_container(
        &config.pebble_socket_dir,
        CONTAINER,
    )));
    let unit = Arc::new(HookTools::new());

    let charm = Charm::new(config, supervisor, unit);
    charm.dispatch(&event).await?;

    info!(event = %event, "Hook complete");

    Ok(())
}
