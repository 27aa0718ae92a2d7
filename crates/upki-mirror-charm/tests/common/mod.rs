// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for charm integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pebble::{ExecOutput, MockSupervisor};
use upki_mirror_charm::reconciler::{CONTAINER, FETCH_COMMAND};
use upki_mirror_charm::unit::MockUnit;
use upki_mirror_charm::{Config, ProxyEnv};

pub const UNIT: &str = "upki-mirror/0";

/// A reachable supervisor whose fetch exits with `exit_code`.
pub async fn supervisor_with_fetch(exit_code: i32) -> Arc<MockSupervisor> {
    let supervisor = Arc::new(MockSupervisor::new(CONTAINER));
    let stderr = if exit_code == 0 { "" } else { "Failed to fetch filters" };
    supervisor
        .expect_exec(FETCH_COMMAND, ExecOutput::exited(exit_code, stderr))
        .await;
    supervisor
}

pub fn unit() -> Arc<MockUnit> {
    Arc::new(MockUnit::new(UNIT))
}

pub fn config(proxy: ProxyEnv) -> Config {
    Config {
        unit_name: UNIT.to_string(),
        app_name: "upki-mirror".to_string(),
        model_name: "pki".to_string(),
        dispatch_path: None,
        proxy,
        pebble_socket_dir: "/charm/containers".into(),
        promtail_binary: "/opt/promtail/promtail".to_string(),
    }
}
