// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access to the physical address space.
//!
//! Startup code runs before RAM is initialized, so it can't lean on anything
//! that assumes statics are valid, and that includes most of the Rust runtime. It
//! also has to touch memory at addresses that come from the linker, and
//! registers at addresses that come from the reference manual. Both kinds of
//! access go through this trait, which on the device is a thin volatile
//! wrapper (`arch::Mmio`) and on the host is a model of the device.

/// A 32-bit physical address space with byte and word access.
///
/// Accesses are performed in program order: an implementation must not merge,
/// elide, or reorder them. (On the device this falls out of using volatile
/// operations.)
pub trait Bus {
    /// Reads one byte.
    ///
    /// # Safety
    ///
    /// `addr` must be valid to read on this device.
    unsafe fn read_u8(&self, addr: u32) -> u8;

    /// Writes one byte.
    ///
    /// # Safety
    ///
    /// `addr` must be valid to write on this device, and nothing else may be
    /// relying on its contents.
    unsafe fn write_u8(&self, addr: u32, value: u8);

    /// Reads one naturally aligned word.
    ///
    /// # Safety
    ///
    /// `addr` must be word-aligned and valid to read on this device.
    unsafe fn read_u32(&self, addr: u32) -> u32;

    /// Writes one naturally aligned word.
    ///
    /// # Safety
    ///
    /// `addr` must be word-aligned and valid to write on this device, and
    /// nothing else may be relying on its contents.
    unsafe fn write_u32(&self, addr: u32, value: u32);

    /// Waits for outstanding writes to complete and flushes the pipeline, so
    /// that changes to core configuration (the vector table base, coprocessor
    /// access) apply to the very next instruction.
    fn sync(&self) {}
}
