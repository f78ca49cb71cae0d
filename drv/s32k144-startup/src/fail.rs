// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording why the device stopped, so that a debugger can find out.
//!
//! This module defines the following binary interface to debuggers:
//!
//! - `STARTUP_FAILED` is a `u32`. It is cleared as the very first thing the
//!   reset handler does, and set to [`FAILED_MAGIC`] when anything reaches
//!   [`die`] or [`record`] (a layout error, a fault, an unhandled interrupt,
//!   the application returning, or a panic). Any other value means nothing
//!   has failed since the last reset.
//!
//! - `STARTUP_EPITAPH` is an array of [`EPITAPH_LEN`] bytes holding as much of
//!   the failure reason as fits, as UTF-8, padded with NULs.
//!
//! A failure can happen before memory initialization, when `.bss` still
//! holds whatever was there at power-up, so the marker is a magic number
//! rather than a `bool`, and the epitaph is zeroed before it's written.

use core::fmt::{self, Display, Write};
use core::sync::atomic::{fence, Ordering};

use crate::layout::LayoutError;
use crate::vectors::slot_name;

/// Value of `STARTUP_FAILED` once something has gone wrong.
pub const FAILED_MAGIC: u32 = 0xB007_FA11;

pub const EPITAPH_LEN: usize = 128;

#[used]
static mut STARTUP_FAILED: u32 = 0;

#[used]
static mut STARTUP_EPITAPH: [u8; EPITAPH_LEN] = [0; EPITAPH_LEN];

/// Why the device ended up halted (or reset).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// The linker handed us a section map we can't initialize from.
    Layout(LayoutError),
    /// The application entry point returned.
    ApplicationReturned,
    /// A core fault was taken.
    Fault(FaultReport),
    /// An interrupt with no handler bound fired.
    UnhandledInterrupt { slot: usize },
}

/// What a fault handler could see when it was entered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultReport {
    /// Active exception number, from IPSR.
    pub exception: usize,
    /// Configurable Fault Status Register.
    pub cfsr: u32,
    /// HardFault Status Register.
    pub hfsr: u32,
}

impl Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Layout(e) => write!(f, "bad memory layout: {e}"),
            HaltReason::ApplicationReturned => f.write_str("application returned"),
            HaltReason::Fault(r) => write!(
                f,
                "{} (exception {}) cfsr={:#010x} hfsr={:#010x}",
                slot_name(r.exception).unwrap_or("fault"),
                r.exception,
                r.cfsr,
                r.hfsr,
            ),
            HaltReason::UnhandledInterrupt { slot } => write!(
                f,
                "unhandled {} (slot {slot})",
                slot_name(*slot).unwrap_or("reserved vector"),
            ),
        }
    }
}

/// Clears the failure marker.
///
/// # Safety
///
/// Only the reset handler may call this, before anything could fail.
pub unsafe fn reset_marker() {
    // Safety: single context, nothing else looks at the marker yet.
    unsafe {
        core::ptr::write_volatile(core::ptr::addr_of_mut!(STARTUP_FAILED), 0);
    }
}

fn begin_epitaph() -> Option<&'static mut [u8; EPITAPH_LEN]> {
    // Safety: failures are recorded from the reset path or from fault
    // handlers that never return, so at most one of these runs at a time.
    let previous = unsafe {
        core::ptr::replace(core::ptr::addr_of_mut!(STARTUP_FAILED), FAILED_MAGIC)
    };
    if previous == FAILED_MAGIC {
        // Failing while failing. Keep the first epitaph; it's the useful one.
        return None;
    }
    // Safety: only the caller that flipped the marker gets here.
    Some(unsafe { &mut *core::ptr::addr_of_mut!(STARTUP_EPITAPH) })
}

/// Sets the failure marker and writes `msg` into the epitaph. Returns `false`
/// (and writes nothing) if a failure had already been recorded.
pub fn record(msg: impl Display) -> bool {
    record_impl(&msg)
}

#[inline(never)]
fn record_impl(msg: &dyn Display) -> bool {
    match begin_epitaph() {
        Some(buf) => {
            write_epitaph(buf, msg);
            true
        }
        None => false,
    }
}

/// Records `msg` and stops.
#[inline(always)]
pub fn die(msg: impl Display) -> ! {
    record_impl(&msg);
    idle()
}

/// Spins forever. Only a reset gets us out.
pub fn idle() -> ! {
    loop {
        // Platform-independent NOP
        fence(Ordering::SeqCst);
    }
}

fn write_epitaph(buf: &mut [u8], msg: &dyn Display) {
    buf.fill(0);
    let mut writer = Eulogist { dest: buf };
    write!(writer, "{msg}").ok();
}

struct Eulogist<'a> {
    dest: &'a mut [u8],
}

impl Write for Eulogist<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let s = s.as_bytes();
        let n = s.len().min(self.dest.len());
        let (dest, leftovers) = {
            let taken = core::mem::take(&mut self.dest);
            taken.split_at_mut(n)
        };
        dest.copy_from_slice(&s[..n]);
        self.dest = leftovers;
        Ok(())
    }
}

#[cfg(all(target_arch = "arm", feature = "panic-handler"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    die(info)
}
