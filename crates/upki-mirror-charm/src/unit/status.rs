// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Unit status and port types.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Status reported for the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Workload is serving.
    Active,
    /// Needs operator intervention.
    Blocked(String),
    /// Waiting on something outside the unit.
    Waiting(String),
    /// The charm is busy with setup.
    Maintenance(String),
}

impl UnitStatus {
    /// Name as understood by `status-set`.
    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Blocked(_) => "blocked",
            UnitStatus::Waiting(_) => "waiting",
            UnitStatus::Maintenance(_) => "maintenance",
        }
    }

    /// Status message, empty for Active.
    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Active => "",
            UnitStatus::Blocked(m) | UnitStatus::Waiting(m) | UnitStatus::Maintenance(m) => m,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// Transport protocol of an opened port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// A (protocol, port) pair exposed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Port {
    /// Protocol.
    pub protocol: Protocol,
    /// Port number.
    pub number: u16,
}

impl Port {
    /// A TCP port.
    pub const fn tcp(number: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            number,
        }
    }
}

/// Renders as `80/tcp`, the hook tool format.
impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

impl FromStr for Port {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidPort(s.to_string());
        let (number, protocol) = s.split_once('/').ok_or_else(invalid)?;
        let number = number.parse().map_err(|_| invalid())?;
        let protocol = match protocol {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => return Err(invalid()),
        };
        Ok(Self { protocol, number })
    }
}
