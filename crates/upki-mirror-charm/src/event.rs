// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hook events.
//!
//! Juju names the hook being run in `JUJU_DISPATCH_PATH` (`hooks/<name>`).
//! Older agents invoke a per-hook symlink instead, so the program name is
//! accepted as a fallback.

use std::fmt;

/// Phase of a relation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPhase {
    /// `-relation-created`
    Created,
    /// `-relation-joined`
    Joined,
    /// `-relation-changed`
    Changed,
    /// `-relation-departed`
    Departed,
    /// `-relation-broken`
    Broken,
}

impl RelationPhase {
    const ALL: [(RelationPhase, &'static str); 5] = [
        (RelationPhase::Created, "-relation-created"),
        (RelationPhase::Joined, "-relation-joined"),
        (RelationPhase::Changed, "-relation-changed"),
        (RelationPhase::Departed, "-relation-departed"),
        (RelationPhase::Broken, "-relation-broken"),
    ];

    fn suffix(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(phase, _)| *phase == self)
            .map(|(_, suffix)| *suffix)
            .unwrap_or_default()
    }
}

/// A hook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// `install`
    Install,
    /// `upgrade-charm`
    UpgradeCharm,
    /// `config-changed`
    ConfigChanged,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `remove`
    Remove,
    /// `leader-elected`
    LeaderElected,
    /// `update-status`
    UpdateStatus,
    /// `<container>-pebble-ready`
    PebbleReady {
        /// Workload container name.
        container: String,
    },
    /// `<endpoint>-relation-<phase>`
    Relation {
        /// Relation endpoint name.
        endpoint: String,
        /// Which relation hook.
        phase: RelationPhase,
    },
    /// Anything else, kept by name.
    Other(String),
}

impl HookEvent {
    /// Parse a hook name such as `nginx-pebble-ready`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "install" => return HookEvent::Install,
            "upgrade-charm" => return HookEvent::UpgradeCharm,
            "config-changed" => return HookEvent::ConfigChanged,
            "start" => return HookEvent::Start,
            "stop" => return HookEvent::Stop,
            "remove" => return HookEvent::Remove,
            "leader-elected" => return HookEvent::LeaderElected,
            "update-status" => return HookEvent::UpdateStatus,
            _ => {}
        }

        if let Some(container) = name.strip_suffix("-pebble-ready")
            && !container.is_empty()
        {
            return HookEvent::PebbleReady {
                container: container.to_string(),
            };
        }

        for (phase, suffix) in RelationPhase::ALL {
            if let Some(endpoint) = name.strip_suffix(suffix)
                && !endpoint.is_empty()
            {
                return HookEvent::Relation {
                    endpoint: endpoint.to_string(),
                    phase,
                };
            }
        }

        HookEvent::Other(name.to_string())
    }

    /// Parse a dispatch path such as `hooks/nginx-pebble-ready`.
    pub fn from_dispatch_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        Self::from_name(name)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookEvent::Install => f.write_str("install"),
            HookEvent::UpgradeCharm => f.write_str("upgrade-charm"),
            HookEvent::ConfigChanged => f.write_str("config-changed"),
            HookEvent::Start => f.write_str("start"),
            HookEvent::Stop => f.write_str("stop"),
            HookEvent::Remove => f.write_str("remove"),
            HookEvent::LeaderElected => f.write_str("leader-elected"),
            HookEvent::UpdateStatus => f.write_str("update-status"),
            HookEvent::PebbleReady { container } => write!(f, "{container}-pebble-ready"),
            HookEvent::Relation { endpoint, phase } => write!(f, "{endpoint}{}", phase.suffix()),
            HookEvent::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pebble_ready() {
        assert_eq!(
            HookEvent::from_dispatch_path("hooks/nginx-pebble-ready"),
            HookEvent::PebbleReady {
                container: "nginx".to_string()
            }
        );
    }

    #[test]
    fn test_parse_relation_with_dashes() {
        assert_eq!(
            HookEvent::from_name("log-proxy-relation-changed"),
            HookEvent::Relation {
                endpoint: "log-proxy".to_string(),
                phase: RelationPhase::Changed,
            }
        );
        assert_eq!(
            HookEvent::from_name("ingress-relation-broken"),
            HookEvent::Relation {
                endpoint: "ingress".to_string(),
                phase: RelationPhase::Broken,
            }
        );
    }

    #[test]
    fn test_parse_lifecycle_and_unknown() {
        assert_eq!(
            HookEvent::from_name("upgrade-charm"),
            HookEvent::UpgradeCharm
        );
        assert_eq!(
            HookEvent::from_dispatch_path("actions/refresh"),
            HookEvent::Other("refresh".to_string())
        );
        assert_eq!(
            HookEvent::from_name("-pebble-ready"),
            HookEvent::Other("-pebble-ready".to_string())
        );
    }

    #[test]
    fn test_display_round_trips_names() {
        for name in [
            "install",
            "nginx-pebble-ready",
            "ingress-relation-joined",
            "log-proxy-relation-departed",
            "secret-changed",
        ] {
            assert_eq!(HookEvent::from_name(name).to_string(), name);
        }
    }
}
