// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core bring-up: the hardware settings that have to be in place before
//! anything else runs.
//!
//! This is the very first thing the reset handler does, before RAM is
//! initialized, so nothing here may touch a static. Each step is selected
//! by [`BringUpConfig`], which the build script generates from the
//! application's startup configuration.

use crate::bus::Bus;
use crate::regs::{
    wdog_cs, Fpu, Scb, Smc, Wdog, CPACR_CP10_CP11_FULL, FPCCR_LSPEN,
};
use crate::trace::{BootRingbuf, Trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FpuConfig {
    /// Leave CPACR alone; the FPU stays inaccessible.
    Untouched,
    /// Grant full access to CP10/CP11.
    ///
    /// With `lazy_stacking: false`, lazy FP state preservation is turned off
    /// as the workaround for ARM erratum 838869 (NXP e6940), where an
    /// interrupted lazy save can corrupt the stacked FP context.
    Enable { lazy_stacking: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WatchdogConfig {
    /// Leave the watchdog as reset left it: running, with a short timeout.
    Untouched,
    /// Turn the watchdog off, leaving it reconfigurable.
    Disabled,
    /// Keep the watchdog running from the LPO clock with this timeout (in
    /// LPO ticks), leaving it reconfigurable.
    Enabled { timeout: u16 },
}

bitflags::bitflags! {
    /// Power modes the application may enter (SMC_PMPROT).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct PowerModes: u8 {
        const ALLOW_HSRUN = 1 << 7;
        const ALLOW_VLP = 1 << 5;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BringUpConfig {
    pub fpu: FpuConfig,
    pub watchdog: WatchdogConfig,
    /// PMPROT is write-once; `None` leaves it for the application to write.
    pub power_modes: Option<PowerModes>,
}

/// Grants full access to CP10/CP11 and applies the lazy-stacking setting.
///
/// On a hard-float image `Reset` has already granted access before entering
/// Rust; writing it again here is harmless and keeps the sequence complete
/// for images that enable the FPU only through configuration.
pub fn enable_fpu(bus: &impl Bus, lazy_stacking: bool) {
    Scb::new(bus).cpacr().modify(|v| v | CPACR_CP10_CP11_FULL);
    // Access has to be in effect before the next instruction could possibly
    // be a floating point one.
    bus.sync();
    if !lazy_stacking {
        Fpu::new(bus).fpccr().modify(|v| v & !FPCCR_LSPEN);
    }
}

/// Opens the watchdog's configuration window and writes `cs` and `toval`.
///
/// The unlock write to CNT has to have completed before CS is written, or
/// the write to CS lands on a locked register and the watchdog resets us.
/// Reading CNT back is what guarantees that (S32K1xx RM 23.3.2).
fn unlock_and_write<B: Bus>(bus: &B, cs: u32, toval: u32) {
    let wdog = Wdog::new(bus);
    wdog.cnt().write(Wdog::<'_, B>::UNLOCK_KEY);
    let _ = wdog.cnt().read();
    wdog.cs().write(cs);
    wdog.toval().write(toval);
}

pub fn configure_watchdog(bus: &impl Bus, config: WatchdogConfig) {
    // Either way we keep 32-bit command words, the LPO clock, and the
    // ability to change our minds later.
    let cs = wdog_cs::CMD32EN | wdog_cs::CLK_LPO | wdog_cs::UPDATE;
    match config {
        WatchdogConfig::Untouched => (),
        WatchdogConfig::Disabled => unlock_and_write(bus, cs, 0xffff),
        WatchdogConfig::Enabled { timeout } => {
            unlock_and_write(bus, cs | wdog_cs::EN, u32::from(timeout))
        }
    }
}

pub fn protect_power_modes(bus: &impl Bus, modes: PowerModes) {
    Smc::new(bus).pmprot().write(u32::from(modes.bits()));
}

/// Runs every configured bring-up step: FPU, then watchdog, then power
/// mode protection.
pub fn bring_up(bus: &impl Bus, config: &BringUpConfig, log: &mut BootRingbuf) {
    if let FpuConfig::Enable { lazy_stacking } = config.fpu {
        enable_fpu(bus, lazy_stacking);
        crate::trace!(log, Trace::FpuEnabled { lazy_stacking });
    }

    configure_watchdog(bus, config.watchdog);
    match config.watchdog {
        WatchdogConfig::Untouched => (),
        WatchdogConfig::Disabled => crate::trace!(log, Trace::WatchdogDisabled),
        WatchdogConfig::Enabled { timeout } => {
            crate::trace!(log, Trace::WatchdogEnabled { timeout })
        }
    }

    if let Some(modes) = config.power_modes {
        protect_power_modes(bus, modes);
        crate::trace!(log, Trace::PowerModesAllowed(modes.bits()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Access, FakeBus};
    use crate::trace::Ringbuf;

    type W = Wdog<'static, FakeBus>;

    fn defaults() -> BringUpConfig {
        BringUpConfig {
            fpu: FpuConfig::Enable {
                lazy_stacking: true,
            },
            watchdog: WatchdogConfig::Disabled,
            power_modes: None,
        }
    }

    fn wdog_log(bus: &FakeBus) -> Vec<Access> {
        bus.log()
            .into_iter()
            .filter(|a| match a {
                Access::Read(x) | Access::Write(x, _) | Access::LockedWrite(x, _) => {
                    (W::BASE..W::BASE + 0xc).contains(x)
                }
                Access::Sync => false,
            })
            .collect()
    }

    #[test]
    fn watchdog_disable_sequence() {
        let bus = FakeBus::new();
        configure_watchdog(&bus, WatchdogConfig::Disabled);
        assert_eq!(
            wdog_log(&bus),
            vec![
                Access::Write(W::CNT, W::UNLOCK_KEY),
                Access::Read(W::CNT),
                Access::Write(W::CS, 0x2120),
                Access::Write(W::TOVAL, 0xffff),
            ]
        );
        assert_eq!(bus.peek_u32(W::CS) & wdog_cs::EN, 0);
    }

    #[test]
    fn watchdog_enable_keeps_it_running() {
        let bus = FakeBus::new();
        configure_watchdog(&bus, WatchdogConfig::Enabled { timeout: 0x1234 });
        assert_eq!(bus.peek_u32(W::CS), 0x2120 | wdog_cs::EN);
        assert_eq!(bus.peek_u32(W::TOVAL), 0x1234);
        assert!(!wdog_log(&bus)
            .iter()
            .any(|a| matches!(a, Access::LockedWrite(..))));
    }

    #[test]
    fn watchdog_untouched() {
        let bus = FakeBus::new();
        configure_watchdog(&bus, WatchdogConfig::Untouched);
        assert!(wdog_log(&bus).is_empty());
    }

    /// Writing CS without the read-back is exactly the bug the model
    /// exists to catch.
    #[test]
    fn model_rejects_config_without_readback() {
        let bus = FakeBus::new();
        let wdog = Wdog::new(&bus);
        wdog.cnt().write(W::UNLOCK_KEY);
        wdog.cs().write(0x2120);
        assert_eq!(
            wdog_log(&bus).last(),
            Some(&Access::LockedWrite(W::CS, 0x2120))
        );
        assert_ne!(bus.peek_u32(W::CS) & wdog_cs::EN, 0);
    }

    #[test]
    fn fpu_enable_sets_cp10_cp11_then_syncs() {
        let bus = FakeBus::new();
        bus.poke_u32(Scb::<'static, FakeBus>::CPACR, 0x3);
        enable_fpu(&bus, true);
        assert_eq!(
            bus.peek_u32(Scb::<'static, FakeBus>::CPACR),
            0x3 | (0xf << 20)
        );
        let log = bus.log();
        let write = log
            .iter()
            .position(|a| matches!(a, Access::Write(x, _) if *x == Scb::<'static, FakeBus>::CPACR));
        assert_eq!(write.map(|i| log.get(i + 1)), Some(Some(&Access::Sync)));
        // Lazy stacking left as reset configured it.
        assert_eq!(bus.peek_u32(Fpu::<'static, FakeBus>::FPCCR), 0xc000_0000);
    }

    #[test]
    fn fpu_already_granted_at_reset() {
        // The reset trampoline has set CP10/CP11 before any of this runs.
        let bus = FakeBus::new();
        bus.poke_u32(Scb::<'static, FakeBus>::CPACR, CPACR_CP10_CP11_FULL);
        enable_fpu(&bus, false);
        assert_eq!(
            bus.writes_to(Scb::<'static, FakeBus>::CPACR),
            vec![CPACR_CP10_CP11_FULL]
        );
        assert_eq!(bus.peek_u32(Fpu::<'static, FakeBus>::FPCCR), 0x8000_0000);
    }

    #[test]
    fn fpu_errata_workaround_clears_lspen() {
        let bus = FakeBus::new();
        enable_fpu(&bus, false);
        assert_eq!(bus.peek_u32(Fpu::<'static, FakeBus>::FPCCR), 0x8000_0000);
    }

    #[test]
    fn bring_up_order_and_trace() {
        let bus = FakeBus::new();
        let mut log = Ringbuf::new(Trace::None);
        let config = BringUpConfig {
            power_modes: Some(PowerModes::ALLOW_HSRUN | PowerModes::ALLOW_VLP),
            ..defaults()
        };
        bring_up(&bus, &config, &mut log);

        let writes: Vec<u32> = bus
            .log()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write(x, _) => Some(x),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                Scb::<'static, FakeBus>::CPACR,
                W::CNT,
                W::CS,
                W::TOVAL,
                Smc::<'static, FakeBus>::PMPROT,
            ]
        );
        assert_eq!(bus.peek_u32(Smc::<'static, FakeBus>::PMPROT), 0xa0);

        let events: Vec<Trace> = log.entries().map(|e| e.payload).collect();
        assert_eq!(
            events,
            vec![
                Trace::FpuEnabled {
                    lazy_stacking: true
                },
                Trace::WatchdogDisabled,
                Trace::PowerModesAllowed(0xa0),
            ]
        );
    }

    #[test]
    fn nothing_configured_touches_nothing() {
        let bus = FakeBus::new();
        let mut log = Ringbuf::new(Trace::None);
        let config = BringUpConfig {
            fpu: FpuConfig::Untouched,
            watchdog: WatchdogConfig::Untouched,
            power_modes: None,
        };
        bring_up(&bus, &config, &mut log);
        assert!(bus.log().is_empty());
        assert_eq!(log.entries().count(), 0);
    }
}
