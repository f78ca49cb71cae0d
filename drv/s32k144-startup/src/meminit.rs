// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory initialization: the part of startup that makes statics valid.
//!
//! Everything here runs before RAM holds anything meaningful, so it can't use
//! statics, and must not be compiled to use floating point. All copies go
//! through the [`Bus`] so the compiler can't turn them into `memcpy` calls
//! (which might live in RAM we haven't initialized yet).

use crate::bus::Bus;
use crate::layout::{SectionMap, Span};
use crate::regs::Scb;
use crate::trace::{BootRingbuf, Trace};

/// Where VTOR ended up pointing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VectorBase {
    Rom(u32),
    Ram(u32),
}

/// Copies the bytes of `load` to `dest`, advancing the source cursor until it
/// reaches `load.end`. A zero-length (or inverted) span copies nothing.
///
/// # Safety
///
/// `load` must be readable, and `[dest, dest + load.len())` must be writable
/// RAM that nothing else is using.
pub unsafe fn copy_region(bus: &impl Bus, load: Span, dest: u32) {
    let mut src = load.start;
    let mut dst = dest;
    while src < load.end {
        // Safety: forwarded from our caller.
        unsafe {
            bus.write_u8(dst, bus.read_u8(src));
        }
        src += 1;
        dst += 1;
    }
}

/// Fills `span` with zeros.
///
/// # Safety
///
/// `span` must be writable RAM that nothing else is using.
pub unsafe fn zero_region(bus: &impl Bus, span: Span) {
    let mut p = span.start;
    while p < span.end {
        // Safety: forwarded from our caller.
        unsafe {
            bus.write_u8(p, 0);
        }
        p += 1;
    }
}

/// Points VTOR at the vector table, copying it to its RAM shadow first if the
/// image has one.
///
/// # Safety
///
/// `map` must describe this image, and interrupts must be masked: between the
/// copy and the VTOR write, an exception would be taken through whichever
/// table VTOR happened to name.
pub unsafe fn relocate_vector_table(
    bus: &impl Bus,
    map: &SectionMap,
) -> VectorBase {
    let v = map.vectors;
    let base = if map.relocates_vectors() {
        let mut src = v.load.start;
        let mut dst = v.run.start;
        while src < v.load.end {
            // Safety: validated layout, and the shadow is reserved for us.
            unsafe {
                bus.write_u32(dst, bus.read_u32(src));
            }
            src += 4;
            dst += 4;
        }
        VectorBase::Ram(v.run.start)
    } else {
        VectorBase::Rom(v.load.start)
    };

    let addr = match base {
        VectorBase::Rom(a) | VectorBase::Ram(a) => a,
    };
    Scb::new(bus).vtor().write(addr);
    // The next exception must use the new table.
    bus.sync();
    base
}

/// Runs the full memory initialization sequence: vector table, `.data`,
/// `.code_ram`, `.bss`, in that order.
///
/// No step is skipped for an empty section; an empty span is simply a loop
/// that doesn't iterate.
///
/// # Safety
///
/// `map` must describe this image and have passed [`SectionMap::validate`].
/// Nothing in the program may have touched a static yet, and interrupts must
/// be masked.
pub unsafe fn init_memory(
    bus: &impl Bus,
    map: &SectionMap,
    log: &mut BootRingbuf,
) -> VectorBase {
    // Safety: forwarded from our caller.
    unsafe {
        let base = relocate_vector_table(bus, map);
        crate::trace!(log, Trace::VectorTable(base));

        copy_region(bus, map.data.load, map.data.run.start);
        crate::trace!(log, Trace::DataCopied { bytes: map.data.load.len() });

        copy_region(bus, map.code.load, map.code.run.start);
        crate::trace!(log, Trace::CodeCopied { bytes: map.code.load.len() });

        zero_region(bus, map.bss);
        crate::trace!(log, Trace::BssZeroed { bytes: map.bss.len() });

        base
    }
}
