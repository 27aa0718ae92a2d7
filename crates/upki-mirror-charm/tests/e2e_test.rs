// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end check against a deployed unit.
//!
//! Requires `TEST_UPKI_MIRROR_ADDRESS` (`host[:port]` of a unit or its
//! ingress) and is skipped when unset.

use std::time::Duration;

/// Helper macro to skip tests if the deployment address is not set.
macro_rules! skip_if_no_deployment {
    () => {
        match std::env::var("TEST_UPKI_MIRROR_ADDRESS") {
            Ok(address) => address,
            Err(_) => {
                eprintln!("Skipping test: TEST_UPKI_MIRROR_ADDRESS not set");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_manifest_is_served() {
    let address = skip_if_no_deployment!();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let response = client
        .get(format!("http://{address}/manifest.json"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let manifest: Result<serde_json::Value, _> = response.json().await;
    assert!(manifest.is_ok(), "manifest.json is not valid JSON");
}
