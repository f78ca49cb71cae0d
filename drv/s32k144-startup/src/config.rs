// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time startup configuration.
//!
//! `build.rs` reads the TOML file named by `S32K_STARTUP_CONFIG` (defaults if
//! unset) and generates [`CONFIG`] and [`FLASH_CONFIG`] from it.

use static_assertions::const_assert;

// The generated file names these unqualified, and uses whichever the
// configuration calls for.
#[allow(unused_imports)]
use crate::bringup::{BringUpConfig, FpuConfig, PowerModes, WatchdogConfig};
#[allow(unused_imports)]
use crate::flash_config::{FlashConfig, Security};

/// What to do once a fault has been recorded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Stay put, so a debugger can look at what happened.
    Halt,
    /// Request a system reset.
    Reset,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StartupConfig {
    pub core: BringUpConfig,
    pub fault_policy: FaultPolicy,
    /// Check the linker's section map before initializing memory from it.
    pub verify_layout: bool,
    /// Unmask interrupts before entering the application.
    pub unmask_interrupts: bool,
}

include!(concat!(env!("OUT_DIR"), "/startup_config.rs"));

// build.rs already refuses this; make sure nobody got around it.
const_assert!(
    ALLOW_PERMANENT_LOCK || !FLASH_CONFIG.security().is_permanent_lock()
);
