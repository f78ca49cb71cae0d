// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reset, vector table, and flash configuration for the NXP S32K144.
//!
//! This is the first code to run after the boot ROM hands over. It owns:
//!
//! - The vector table (`vectors`), placed at the start of flash.
//! - The flash configuration record (`flash_config`), read by the boot ROM at
//!   offset 0x400 before any instruction executes.
//! - The reset sequence (`boot`): core bring-up, then memory initialization,
//!   then the application, then a terminal halt.
//!
//! Everything that touches hardware goes through the [`bus::Bus`] trait, so
//! the interesting parts can be exercised on the host. The pieces that only
//! make sense on the device live in `arch`: the reset handler itself, the
//! statics that get placed in the image, and the fault handlers.
//!
//! # Using this crate
//!
//! An application links this crate, provides a `memory.x` describing the
//! device's memory regions, passes `-Tlink.x` to the linker, and names its
//! entry point:
//!
//! ```ignore
//! drv_s32k144_startup::entry!(main);
//!
//! fn main() {
//!     // ...
//! }
//! ```
//!
//! Interrupt handlers are bound by defining an `extern "C"` function with the
//! interrupt's name (see [`vectors::Interrupt`]); anything left unbound ends
//! up in `DefaultHandler`.
//!
//! When something goes wrong (a bad section map, a fault, an unbound
//! interrupt, the application returning, or a panic with the default
//! `panic-handler` feature) the reason is written to `STARTUP_EPITAPH` (see
//! [`fail`]) and the device stops, or resets if the startup configuration
//! asks for `fault-policy = "reset"`.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod boot;
pub mod bringup;
pub mod bus;
pub mod config;
pub mod fail;
pub mod flash_config;
pub mod layout;
pub mod meminit;
pub mod regs;
pub mod trace;
pub mod vectors;

#[cfg(test)]
mod fake;

/// Names the application entry point.
///
/// The reset sequence calls the named function exactly once, after RAM has
/// been initialized. Returning from it halts the device.
#[macro_export]
macro_rules! entry {
    ($path:path) => {
        #[doc(hidden)]
        #[export_name = "__s32k144_application_main"]
        pub fn __s32k144_application_main() {
            let f: fn() = $path;
            f()
        }
    };
}

/// Defines a function that executes from RAM.
///
/// The function body is linked into `.code_ram`, which the reset sequence
/// copies out of flash before the application starts. Use this for code that
/// must not run from flash while flash is busy, such as programming routines.
#[macro_export]
macro_rules! ram_fn {
    ($(#[$attr:meta])* $vis:vis fn $name:ident $($rest:tt)*) => {
        $(#[$attr])*
        #[link_section = ".code_ram"]
        #[inline(never)]
        $vis fn $name $($rest)*
    };
}
