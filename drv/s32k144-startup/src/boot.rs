// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reset sequence, as a typestate.
//!
//! ```text
//! Uninitialized --configure_core--> CoreConfigured --init_memory-->
//!     MemoryInitialized --run_application--> Halted
//! ```
//!
//! Each step consumes the previous state, so steps can't be skipped,
//! repeated, or reordered. A running application has no state value of its
//! own: it is the inside of `run_application`, traced as
//! `Trace::ApplicationRunning`. `Halted` has no way out but
//! [`Boot::halt`].
//!
//! Nothing here knows about the real hardware; `arch` drives this with the
//! device bus and the linker's section map.

use crate::bringup::{bring_up, BringUpConfig};
use crate::bus::Bus;
use crate::fail::{self, HaltReason};
use crate::layout::{LayoutError, SectionMap};
use crate::meminit::{init_memory, VectorBase};
use crate::trace::{BootRingbuf, Trace};

/// Where the reset sequence has got to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootState {
    Uninitialized,
    CoreConfigured,
    MemoryInitialized,
    Halted,
}

pub struct Uninitialized(());
pub struct CoreConfigured(());
pub struct MemoryInitialized {
    vectors: VectorBase,
}
pub struct Halted(());

mod sealed {
    pub trait Sealed {}
}

/// A state of the reset sequence.
pub trait State: sealed::Sealed {
    const STATE: BootState;
}

macro_rules! state {
    ($t:ty, $s:ident) => {
        impl sealed::Sealed for $t {}
        impl State for $t {
            const STATE: BootState = BootState::$s;
        }
    };
}

state!(Uninitialized, Uninitialized);
state!(CoreConfigured, CoreConfigured);
state!(MemoryInitialized, MemoryInitialized);
state!(Halted, Halted);

/// The one reset sequence of this power cycle.
pub struct Boot<'a, B: Bus, S: State> {
    bus: &'a B,
    state: S,
}

impl<B: Bus, S: State> Boot<'_, B, S> {
    pub fn state(&self) -> BootState {
        S::STATE
    }
}

impl<'a, B: Bus> Boot<'a, B, Uninitialized> {
    /// Starts the reset sequence.
    ///
    /// # Safety
    ///
    /// There must be only one of these per reset, created before anything
    /// else has run, with interrupts masked.
    pub unsafe fn new(bus: &'a B) -> Self {
        Self {
            bus,
            state: Uninitialized(()),
        }
    }

    pub fn configure_core(
        self,
        config: &BringUpConfig,
        log: &mut BootRingbuf,
    ) -> Boot<'a, B, CoreConfigured> {
        crate::trace!(log, Trace::Reset);
        bring_up(self.bus, config, log);
        crate::trace!(log, Trace::CoreConfigured);
        Boot {
            bus: self.bus,
            state: CoreConfigured(()),
        }
    }
}

impl<'a, B: Bus> Boot<'a, B, CoreConfigured> {
    /// Initializes RAM from `map`.
    ///
    /// With `verify` set, `map` is validated first and nothing is written if
    /// it's wrong.
    ///
    /// # Safety
    ///
    /// `map` must describe this image. Nothing may have touched a static yet.
    pub unsafe fn init_memory(
        self,
        map: &SectionMap,
        verify: bool,
        log: &mut BootRingbuf,
    ) -> Result<Boot<'a, B, MemoryInitialized>, LayoutError> {
        if verify {
            map.validate()?;
        }
        // Safety: forwarded from our caller.
        let vectors = unsafe { init_memory(self.bus, map, log) };
        crate::trace!(log, Trace::MemoryInitialized);
        Ok(Boot {
            bus: self.bus,
            state: MemoryInitialized { vectors },
        })
    }
}

impl<'a, B: Bus> Boot<'a, B, MemoryInitialized> {
    /// Where the vector table ended up.
    pub fn vectors(&self) -> VectorBase {
        self.state.vectors
    }

    /// Calls the application entry point, once. If it returns, we're done.
    pub fn run_application(
        self,
        log: &mut BootRingbuf,
        entry: impl FnOnce(),
    ) -> Boot<'a, B, Halted> {
        crate::trace!(log, Trace::ApplicationRunning);
        entry();
        crate::trace!(log, Trace::ApplicationReturned);
        crate::trace!(log, Trace::Halted);
        Boot {
            bus: self.bus,
            state: Halted(()),
        }
    }
}

impl<B: Bus> Boot<'_, B, Halted> {
    /// Records that the application returned and stops for good. Interrupts
    /// are left as the application left them.
    pub fn halt(self) -> ! {
        fail::die(HaltReason::ApplicationReturned)
    }
}
