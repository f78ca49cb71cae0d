// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register views for the handful of core and chip registers startup touches.
//!
//! Each peripheral is a fixed set of addresses, not an object: there is
//! exactly one of each per chip. A block type (e.g. [`Wdog`]) just pairs a
//! [`Bus`] with the register offsets from the reference manual and hands out
//! [`Reg`] views.

use crate::bus::Bus;

/// One 32-bit memory-mapped register.
pub struct Reg<'a, B: Bus> {
    bus: &'a B,
    addr: u32,
}

impl<'a, B: Bus> Reg<'a, B> {
    /// Binds a register view to `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be a register that's valid for word access on this device.
    /// The block types below only call this with addresses taken from the
    /// reference manual.
    const unsafe fn new(bus: &'a B, addr: u32) -> Self {
        Self { bus, addr }
    }

    pub fn read(&self) -> u32 {
        // Safety: construction guarantees this is a register address.
        unsafe { self.bus.read_u32(self.addr) }
    }

    pub fn write(&self, value: u32) {
        // Safety: construction guarantees this is a register address.
        unsafe { self.bus.write_u32(self.addr, value) }
    }

    /// Read-modify-write. Not atomic; nothing else runs during startup.
    pub fn modify(&self, f: impl FnOnce(u32) -> u32) {
        let v = self.read();
        self.write(f(v));
    }
}

/// System Control Block (ARMv7-M ARM B3.2.2).
pub struct Scb<'a, B: Bus> {
    bus: &'a B,
}

impl<'a, B: Bus> Scb<'a, B> {
    pub const VTOR: u32 = 0xE000_ED08;
    pub const CFSR: u32 = 0xE000_ED28;
    pub const HFSR: u32 = 0xE000_ED2C;
    pub const CPACR: u32 = 0xE000_ED88;

    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    /// Vector Table Offset Register.
    pub fn vtor(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::VTOR) }
    }

    /// Configurable Fault Status Register.
    pub fn cfsr(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::CFSR) }
    }

    /// HardFault Status Register.
    pub fn hfsr(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::HFSR) }
    }

    /// Coprocessor Access Control Register.
    pub fn cpacr(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::CPACR) }
    }
}

/// Full access to CP10 and CP11, i.e. the FPU.
pub const CPACR_CP10_CP11_FULL: u32 = 0b1111 << 20;

/// Floating point extension registers (ARMv7-M ARM B3.2.20).
pub struct Fpu<'a, B: Bus> {
    bus: &'a B,
}

impl<'a, B: Bus> Fpu<'a, B> {
    pub const FPCCR: u32 = 0xE000_EF34;

    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    /// Floating-Point Context Control Register.
    pub fn fpccr(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::FPCCR) }
    }
}

/// Lazy state preservation enable.
pub const FPCCR_LSPEN: u32 = 1 << 30;

/// Watchdog timer (S32K1xx reference manual, chapter 23).
pub struct Wdog<'a, B: Bus> {
    bus: &'a B,
}

impl<'a, B: Bus> Wdog<'a, B> {
    pub const BASE: u32 = 0x4005_2000;
    pub const CS: u32 = Self::BASE;
    pub const CNT: u32 = Self::BASE + 0x4;
    pub const TOVAL: u32 = Self::BASE + 0x8;

    /// Written to CNT to open the configuration window.
    pub const UNLOCK_KEY: u32 = 0xD928_C520;

    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    /// Control and status.
    pub fn cs(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::CS) }
    }

    /// Counter; also the unlock/refresh command register.
    pub fn cnt(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::CNT) }
    }

    /// Timeout value.
    pub fn toval(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::TOVAL) }
    }
}

pub mod wdog_cs {
    /// Further updates allowed after this write.
    pub const UPDATE: u32 = 1 << 5;
    pub const EN: u32 = 1 << 7;
    /// Clock select field (bits 8-9); 0b01 is the 128 kHz LPO.
    pub const CLK_LPO: u32 = 0b01 << 8;
    /// Enables 32-bit refresh and unlock command words.
    pub const CMD32EN: u32 = 1 << 13;
}

/// System Mode Controller (S32K1xx reference manual, chapter 39).
pub struct Smc<'a, B: Bus> {
    bus: &'a B,
}

impl<'a, B: Bus> Smc<'a, B> {
    pub const BASE: u32 = 0x4007_E000;
    pub const PMPROT: u32 = Self::BASE + 0x8;

    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    /// Power Mode Protection. Write-once after reset.
    pub fn pmprot(&self) -> Reg<'a, B> {
        unsafe { Reg::new(self.bus, Self::PMPROT) }
    }
}
