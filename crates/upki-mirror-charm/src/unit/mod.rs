// Copyright (C) 2026 The upki-mirror charm authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Unit module - the platform surface of one unit.

mod hook_tools;
pub mod mock;
mod status;
mod traits;

pub use hook_tools::HookTools;
pub use mock::{MockRelation, MockUnit};
pub use status::{Port, Protocol, UnitStatus};
pub use traits::*;
