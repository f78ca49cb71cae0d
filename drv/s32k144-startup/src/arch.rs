// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture-specific support.
//!
//! On the device this is where the reset handler, the statics that make up
//! the vector table and flash configuration field, and the fault handlers
//! live. Host builds (for tests) get nothing here; everything they exercise
//! goes through `Bus` instead.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        pub mod arm_m;
        pub use arm_m::*;
    }
}
