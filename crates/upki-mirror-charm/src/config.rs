// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the upki-mirror charm.
//!
//! Juju passes everything a hook needs through the process environment.

use std::path::PathBuf;

/// Proxy settings the model injects for the charm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyEnv {
    /// Value of `JUJU_CHARM_HTTP_PROXY`, empty when unset.
    pub http_proxy: String,
    /// Value of `JUJU_CHARM_HTTPS_PROXY`, empty when unset.
    pub https_proxy: String,
}

impl ProxyEnv {
    /// Read proxy settings from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            http_proxy: lookup("JUJU_CHARM_HTTP_PROXY").unwrap_or_default(),
            https_proxy: lookup("JUJU_CHARM_HTTPS_PROXY").unwrap_or_default(),
        }
    }
}

/// Charm configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unit name, e.g. `upki-mirror/0`
    pub unit_name: String,
    /// Application name derived from the unit name
    pub app_name: String,
    /// Model the unit is deployed in
    pub model_name: String,
    /// Hook being dispatched, e.g. `hooks/nginx-pebble-ready`
    pub dispatch_path: Option<String>,
    /// Proxy settings handed to the fetch command
    pub proxy: ProxyEnv,
    /// Directory holding `<container>/pebble.socket`
    pub pebble_socket_dir: PathBuf,
    /// Path of the promtail binary inside the workload container
    pub promtail_binary: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let unit_name = lookup("JUJU_UNIT_NAME")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnvVar("JUJU_UNIT_NAME"))?;

        let app_name = unit_name
            .split_once('/')
            .map(|(app, _)| app.to_string())
            .filter(|app| !app.is_empty())
            .ok_or_else(|| ConfigError::InvalidUnitName(unit_name.clone()))?;

        let model_name = lookup("JUJU_MODEL_NAME")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnvVar("JUJU_MODEL_NAME"))?;

        let dispatch_path = lookup("JUJU_DISPATCH_PATH").filter(|v| !v.is_empty());

        let pebble_socket_dir = PathBuf::from(
            lookup("UPKI_PEBBLE_SOCKET_DIR")
                .unwrap_or_else(|| pebble::client::DEFAULT_SOCKET_DIR.to_string()),
        );

        let promtail_binary =
            lookup("UPKI_PROMTAIL_BINARY").unwrap_or_else(|| "/opt/promtail/promtail".to_string());

        Ok(Self {
            unit_name,
            app_name,
            model_name,
            dispatch_path,
            proxy: ProxyEnv::from_lookup(&lookup),
            pebble_socket_dir,
            promtail_binary,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The unit name is not of the form `<app>/<number>`.
    #[error("Invalid unit name: {0}")]
    InvalidUnitName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("JUJU_UNIT_NAME", "upki-mirror/0"),
            ("JUJU_MODEL_NAME", "pki"),
        ]))
        .unwrap();

        assert_eq!(config.app_name, "upki-mirror");
        assert_eq!(config.model_name, "pki");
        assert_eq!(config.dispatch_path, None);
        assert_eq!(config.proxy, ProxyEnv::default());
        assert_eq!(config.pebble_socket_dir, PathBuf::from("/charm/containers"));
        assert_eq!(config.promtail_binary, "/opt/promtail/promtail");
    }

    #[test]
    fn test_config_reads_proxies() {
        let config = Config::from_lookup(lookup(&[
            ("JUJU_UNIT_NAME", "upki-mirror/3"),
            ("JUJU_MODEL_NAME", "pki"),
            ("JUJU_CHARM_HTTP_PROXY", "http://squid:3128"),
            ("JUJU_CHARM_HTTPS_PROXY", "http://squid:3129"),
            ("JUJU_DISPATCH_PATH", "hooks/nginx-pebble-ready"),
        ]))
        .unwrap();

        assert_eq!(config.proxy.http_proxy, "http://squid:3128");
        assert_eq!(config.proxy.https_proxy, "http://squid:3129");
        assert_eq!(
            config.dispatch_path.as_deref(),
            Some("hooks/nginx-pebble-ready")
        );
    }

    #[test]
    fn test_config_missing_unit() {
        let err = Config::from_lookup(lookup(&[("JUJU_MODEL_NAME", "pki")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("JUJU_UNIT_NAME")));
    }

    #[test]
    fn test_config_invalid_unit_name() {
        let err = Config::from_lookup(lookup(&[
            ("JUJU_UNIT_NAME", "upki-mirror"),
            ("JUJU_MODEL_NAME", "pki"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUnitName(_)));
    }
}
