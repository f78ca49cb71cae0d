// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M4 support: reset, the image's fixed-address statics, and the
//! terminal fault handlers.
//!
//! `link.x` lays these out as:
//!
//! ```text
//! 0x000  initial SP        (from the linker)
//! 0x004  __RESET_VECTOR    .isr_vector.reset
//! 0x008  __EXCEPTIONS      .isr_vector.exceptions   14 slots
//! 0x040  __INTERRUPTS      .isr_vector.interrupts   239 slots
//! 0x3fc  (end of table)
//! 0x400  FLASH_CONFIGURATION  .FlashConfig          16 bytes
//! ```

use core::arch::asm;
use core::ptr::{addr_of, addr_of_mut};

use crate::boot::Boot;
use crate::bus::Bus;
use crate::config::{FaultPolicy, CONFIG, FLASH_CONFIG};
use crate::fail::{self, FaultReport, HaltReason};
use crate::flash_config::FlashConfig;
use crate::layout::{Relocation, SectionMap, Span};
use crate::regs::{Scb, CPACR_CP10_CP11_FULL};
use crate::trace::{BootRingbuf, Ringbuf, Trace};
use crate::vectors::{Vector, DEVICE_SLOTS, DEVICE_VECTORS};

/// The physical address space, accessed with volatile loads and stores.
pub struct Mmio;

impl Bus for Mmio {
    unsafe fn read_u8(&self, addr: u32) -> u8 {
        unsafe { core::ptr::read_volatile(addr as *const u8) }
    }

    unsafe fn write_u8(&self, addr: u32, value: u8) {
        unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
    }

    unsafe fn read_u32(&self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    unsafe fn write_u32(&self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }

    fn sync(&self) {
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}

// Section boundaries, from link.x. Only their addresses mean anything.
extern "C" {
    static __VECTOR_TABLE: u32;
    static __VECTOR_TABLE_END: u32;
    static __VECTOR_RAM: u32;
    static __VECTOR_RAM_END: u32;
    static __DATA_ROM: u32;
    static __DATA_ROM_END: u32;
    static __DATA_RAM: u32;
    static __DATA_RAM_END: u32;
    static __CODE_ROM: u32;
    static __CODE_ROM_END: u32;
    static __CODE_RAM: u32;
    static __CODE_RAM_END: u32;
    static __BSS_START: u32;
    static __BSS_END: u32;
}

extern "Rust" {
    // Defined by `entry!`.
    fn __s32k144_application_main();
}

/// Collects the linker's section boundaries.
pub fn section_map() -> SectionMap {
    macro_rules! span {
        ($start:ident, $end:ident) => {
            // Safety: we only take the addresses of these symbols.
            unsafe {
                Span::new(addr_of!($start) as u32, addr_of!($end) as u32)
            }
        };
    }

    let table = span!(__VECTOR_TABLE, __VECTOR_TABLE_END);
    // An empty shadow means the table runs from flash.
    let shadow = span!(__VECTOR_RAM, __VECTOR_RAM_END);
    SectionMap {
        vectors: Relocation {
            load: table,
            run: if shadow.is_empty() { table } else { shadow },
        },
        data: Relocation {
            load: span!(__DATA_ROM, __DATA_ROM_END),
            run: span!(__DATA_RAM, __DATA_RAM_END),
        },
        code: Relocation {
            load: span!(__CODE_ROM, __CODE_ROM_END),
            run: span!(__CODE_RAM, __CODE_RAM_END),
        },
        bss: span!(__BSS_START, __BSS_END),
    }
}

/// The boot trace, once RAM is usable. Until then it lives on the stack.
#[used]
static mut BOOT_RINGBUF: BootRingbuf = Ringbuf::new(Trace::None);

// On a hard-float image the compiler is free to use VFP registers anywhere,
// including the prologue of `reset`. Grant coprocessor access first, from
// code the compiler didn't write, then enter Rust.
#[cfg(s32k_fpu_at_reset)]
core::arch::global_asm!(
    ".section .text.Reset,\"ax\",%progbits",
    ".global Reset",
    ".type Reset,%function",
    ".thumb_func",
    "Reset:",
    "    ldr r0, ={cpacr}",
    "    ldr r1, [r0]",
    "    orr r1, r1, #{cp10_cp11}",
    "    str r1, [r0]",
    "    dsb",
    "    isb",
    "    b {reset}",
    ".size Reset, . - Reset",
    cpacr = const Scb::<'static, Mmio>::CPACR,
    cp10_cp11 = const CPACR_CP10_CP11_FULL,
    reset = sym reset,
);

#[doc(hidden)]
#[cfg_attr(not(s32k_fpu_at_reset), export_name = "Reset")]
pub unsafe extern "C" fn reset() -> ! {
    // Architecturally we come out of reset with interrupts enabled (but
    // nothing in the NVIC enabled). Make sure nothing gets in.
    cortex_m::interrupt::disable();
    // Safety: first thing after reset.
    unsafe { fail::reset_marker() };

    let bus = Mmio;
    let mut log = BootRingbuf::new(Trace::None);

    // Safety: this is the reset handler; there's only one of us.
    let boot = unsafe { Boot::new(&bus) }.configure_core(&CONFIG.core, &mut log);

    let map = section_map();
    // Safety: the map is the one for this image, and nothing has used a
    // static (other than the failure marker, which lives through this).
    let boot = match unsafe {
        boot.init_memory(&map, CONFIG.verify_layout, &mut log)
    } {
        Ok(boot) => boot,
        Err(e) => fail::die(HaltReason::Layout(e)),
    };

    // Statics are valid from here on; move the trace somewhere a debugger
    // can find it.
    //
    // Safety: nothing else has a reference to this, and interrupts are still
    // masked.
    let ring = unsafe { &mut *addr_of_mut!(BOOT_RINGBUF) };
    *ring = log;

    if CONFIG.unmask_interrupts {
        crate::trace!(ring, Trace::InterruptsUnmasked);
        // Safety: the vector table is in place and RAM is initialized, so
        // any handler that runs finds the world as it expects.
        unsafe { cortex_m::interrupt::enable() };
    }

    // Safety: `entry!` defines this as a plain Rust fn().
    let halted =
        boot.run_application(ring, || unsafe { __s32k144_application_main() });
    halted.halt()
}

extern "C" {
    // The trampoline above, or `reset` itself without an FPU to enable.
    fn Reset() -> !;
}

#[used]
#[link_section = ".isr_vector.reset"]
#[no_mangle]
pub static __RESET_VECTOR: unsafe extern "C" fn() -> ! = Reset;

// Core exceptions. link.x binds each to its dedicated handler (faults) or to
// DefaultHandler, unless the application defines it.
extern "C" {
    fn NonMaskableInt();
    fn HardFault();
    fn MemoryManagement();
    fn BusFault();
    fn UsageFault();
    fn SVCall();
    fn DebugMonitor();
    fn PendSV();
    fn SysTick();
}

/// Vector table slots 2 through 15.
#[used]
#[link_section = ".isr_vector.exceptions"]
#[no_mangle]
pub static __EXCEPTIONS: [Vector; 14] = [
    Vector::handler(NonMaskableInt),
    Vector::handler(HardFault),
    Vector::handler(MemoryManagement),
    Vector::handler(BusFault),
    Vector::handler(UsageFault),
    Vector::RESERVED,
    Vector::RESERVED,
    Vector::RESERVED,
    Vector::RESERVED,
    Vector::handler(SVCall),
    Vector::handler(DebugMonitor),
    Vector::RESERVED,
    Vector::handler(PendSV),
    Vector::handler(SysTick),
];

#[used]
#[link_section = ".isr_vector.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Vector; DEVICE_SLOTS] = DEVICE_VECTORS;

#[used]
#[link_section = ".FlashConfig"]
#[no_mangle]
pub static FLASH_CONFIGURATION: FlashConfig = FLASH_CONFIG;

/// Reads the number of the exception we're handling out of IPSR. This is
/// also its slot in the vector table.
fn active_exception() -> usize {
    let ipsr: u32;
    // Safety: we're just reading the PSR.
    unsafe {
        asm!(
            "mrs {}, IPSR",
            out(reg) ipsr,
            options(pure, nomem, preserves_flags, nostack),
        );
    }
    (ipsr & 0x1FF) as usize
}

/// Records `reason` and applies the fault policy.
fn conclude(reason: HaltReason) -> ! {
    fail::record(reason);
    match CONFIG.fault_policy {
        FaultPolicy::Halt => fail::idle(),
        FaultPolicy::Reset => cortex_m::peripheral::SCB::sys_reset(),
    }
}

fn fault() -> ! {
    let scb = Scb::new(&Mmio);
    conclude(HaltReason::Fault(FaultReport {
        exception: active_exception(),
        cfsr: scb.cfsr().read(),
        hfsr: scb.hfsr().read(),
    }))
}

/// Where every vector nobody bound ends up.
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn DefaultHandler() {
    conclude(HaltReason::UnhandledInterrupt {
        slot: active_exception(),
    })
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn NonMaskableInt_() {
    fault()
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn HardFault_() {
    fault()
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn MemoryManagement_() {
    fault()
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn BusFault_() {
    fault()
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn UsageFault_() {
    fault()
}
