// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vector table layout.
//!
//! The table is 255 words: the initial stack pointer, 15 architectural
//! exception slots, and 239 device slots numbered by the S32K144 interrupt
//! map. The device half, along with the [`Interrupt`] enum, is generated by
//! `build.rs` from that map, so the two can't disagree.
//!
//! The statics that actually make up the table in the image live in `arch`,
//! split into `.isr_vector.*` input sections that `link.x` concatenates in
//! order.

use static_assertions::{const_assert, const_assert_eq};

use crate::flash_config::FLASH_CONFIG_OFFSET;

/// Exception and interrupt handlers are plain C-ABI functions with no
/// arguments and no return value.
pub type Handler = unsafe extern "C" fn();

/// One vector table slot: either a handler or a reserved (zero) word.
#[derive(Copy, Clone)]
#[repr(C)]
pub union Vector {
    // Only ever read by the core.
    #[allow(dead_code)]
    handler: Handler,
    reserved: usize,
}

impl Vector {
    pub const RESERVED: Self = Self { reserved: 0 };

    pub const fn handler(f: Handler) -> Self {
        Self { handler: f }
    }
}

/// Slots belonging to the core: SP, Reset, and the fourteen exceptions
/// (several reserved) after it.
pub const EXCEPTION_SLOTS: usize = 16;
pub const TOTAL_SLOTS: usize = EXCEPTION_SLOTS + DEVICE_SLOTS;

/// Size of the table in bytes. `link.x` checks the image against this.
pub const VECTOR_TABLE_BYTES: usize = TOTAL_SLOTS * 4;

const_assert_eq!(VECTOR_TABLE_BYTES, 0x3fc);
// The table has to end before the flash configuration record begins.
const_assert!(VECTOR_TABLE_BYTES as u32 <= FLASH_CONFIG_OFFSET);
const_assert_eq!(
    core::mem::size_of::<Vector>(),
    core::mem::size_of::<usize>()
);

/// Architectural exceptions, numbered by their slot in the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Exception {
    Reset = 1,
    NonMaskableInt = 2,
    HardFault = 3,
    MemoryManagement = 4,
    BusFault = 5,
    UsageFault = 6,
    SVCall = 11,
    DebugMonitor = 12,
    PendSV = 14,
    SysTick = 15,
}

impl Exception {
    pub const ALL: [Exception; 10] = [
        Exception::Reset,
        Exception::NonMaskableInt,
        Exception::HardFault,
        Exception::MemoryManagement,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SVCall,
        Exception::DebugMonitor,
        Exception::PendSV,
        Exception::SysTick,
    ];

    pub const fn slot(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Exception::Reset => "Reset",
            Exception::NonMaskableInt => "NonMaskableInt",
            Exception::HardFault => "HardFault",
            Exception::MemoryManagement => "MemoryManagement",
            Exception::BusFault => "BusFault",
            Exception::UsageFault => "UsageFault",
            Exception::SVCall => "SVCall",
            Exception::DebugMonitor => "DebugMonitor",
            Exception::PendSV => "PendSV",
            Exception::SysTick => "SysTick",
        }
    }
}

include!(concat!(env!("OUT_DIR"), "/interrupts.rs"));

impl Interrupt {
    /// IRQ number, as the NVIC numbers it.
    pub const fn number(self) -> u16 {
        self as u16
    }

    /// Position in the vector table.
    pub const fn slot(self) -> usize {
        EXCEPTION_SLOTS + self as usize
    }
}

/// Names whatever lives in vector table `slot`, for fault reports. The
/// active exception number in IPSR is a slot number.
pub fn slot_name(slot: usize) -> Option<&'static str> {
    if slot < EXCEPTION_SLOTS {
        Exception::ALL
            .iter()
            .find(|e| e.slot() == slot)
            .map(|e| e.name())
    } else {
        Interrupt::ALL
            .iter()
            .find(|i| i.slot() == slot)
            .map(|i| i.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupts_fit_and_are_ordered() {
        let mut prev = None;
        for irq in Interrupt::ALL {
            assert!(irq.slot() < TOTAL_SLOTS, "{} out of range", irq.name());
            if let Some(p) = prev {
                assert!(irq.number() > p, "{} out of order", irq.name());
            }
            prev = Some(irq.number());
        }
        assert_eq!(prev, Some(122));
    }

    #[test]
    fn generated_slots_fill_the_table() {
        assert_eq!(DEVICE_SLOTS, 239);
        assert_eq!(TOTAL_SLOTS, 255);
        assert!(VECTOR_TABLE_BYTES as u32 <= FLASH_CONFIG_OFFSET);
        let last = Interrupt::ALL[Interrupt::ALL.len() - 1];
        assert!(last.slot() < TOTAL_SLOTS);
    }

    #[test]
    fn known_slots() {
        assert_eq!(Interrupt::DMA0.slot(), 16);
        assert_eq!(Interrupt::PORTA.number(), 59);
        assert_eq!(Interrupt::PORTA.slot(), 75);
        assert_eq!(Interrupt::LPUART1_RxTx.number(), 33);
        assert_eq!(Interrupt::FTM3_Ovf_Reload.slot(), 138);
    }

    #[test]
    fn slot_names() {
        assert_eq!(slot_name(3), Some("HardFault"));
        assert_eq!(slot_name(Exception::SysTick.slot()), Some("SysTick"));
        assert_eq!(slot_name(75), Some("PORTA"));
        // Reserved slots, and anything past the end, have no name.
        assert_eq!(slot_name(7), None);
        assert_eq!(slot_name(16 + 29), None);
        assert_eq!(slot_name(TOTAL_SLOTS), None);
    }

    #[test]
    fn reserved_is_zero() {
        // Safety: RESERVED initializes the `reserved` field.
        assert_eq!(unsafe { Vector::RESERVED.reserved }, 0);
    }
}
