// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Smallest useful S32K144 image: boots, runs a routine out of RAM, and
//! returns, which leaves the device halted with an epitaph saying so.

#![no_std]
#![no_main]

use drv_s32k144_startup::{entry, ram_fn};

entry!(main);

ram_fn! {
    /// Copied into SRAM_L by the reset sequence before `main` runs.
    fn spin(n: u32) {
        for _ in 0..n {
            cortex_m::asm::nop();
        }
    }
}

fn main() {
    spin(16);
}
