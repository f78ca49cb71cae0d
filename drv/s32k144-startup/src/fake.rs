// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host-side model of the S32K144 address space, for tests.
//!
//! Memory is sparse and reads as zero until written. Every word access to a
//! register we model is logged, and the watchdog's unlock state machine is
//! modeled closely enough to catch ordering mistakes: the configuration
//! registers only accept writes after the unlock key has been written to CNT
//! *and* CNT has subsequently been read back.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::bus::Bus;
use crate::regs::{wdog_cs, Fpu, Scb, Smc, Wdog};

/// Something the bus saw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(u32),
    Write(u32, u32),
    Sync,
    /// A write to a locked watchdog configuration register, which the real
    /// part would have ignored (or reset over).
    LockedWrite(u32, u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum WdogLock {
    Locked,
    /// Key written, completion not yet observed.
    KeyWritten,
    Unlocked,
}

struct State {
    mem: BTreeMap<u32, u8>,
    log: Vec<Access>,
    wdog: WdogLock,
    byte_writes: usize,
    word_writes: usize,
}

pub struct FakeBus {
    state: RefCell<State>,
}

const LOGGED: [u32; 9] = [
    Scb::<'static, FakeBus>::VTOR,
    Scb::<'static, FakeBus>::CPACR,
    Scb::<'static, FakeBus>::CFSR,
    Scb::<'static, FakeBus>::HFSR,
    Fpu::<'static, FakeBus>::FPCCR,
    Wdog::<'static, FakeBus>::CS,
    Wdog::<'static, FakeBus>::CNT,
    Wdog::<'static, FakeBus>::TOVAL,
    Smc::<'static, FakeBus>::PMPROT,
];

impl FakeBus {
    pub fn new() -> Self {
        let bus = Self {
            state: RefCell::new(State {
                mem: BTreeMap::new(),
                log: Vec::new(),
                wdog: WdogLock::Locked,
                byte_writes: 0,
                word_writes: 0,
            }),
        };
        // Reset values that matter to us (S32K1xx RM 23.3): the watchdog
        // comes out of reset enabled, clocked from LPO, updatable.
        bus.poke_u32(
            Wdog::<'static, FakeBus>::CS,
            wdog_cs::EN | wdog_cs::CLK_LPO | wdog_cs::UPDATE,
        );
        bus.poke_u32(Wdog::<'static, FakeBus>::TOVAL, 0x0400);
        // Lazy stacking is on at reset.
        bus.poke_u32(Fpu::<'static, FakeBus>::FPCCR, 0xC000_0000);
        bus
    }

    /// Fills memory starting at `addr` without logging.
    pub fn load(&self, addr: u32, bytes: &[u8]) {
        let mut s = self.state.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            s.mem.insert(addr + i as u32, b);
        }
    }

    /// Reads memory without logging.
    pub fn dump(&self, addr: u32, len: u32) -> Vec<u8> {
        let s = self.state.borrow();
        (addr..addr + len)
            .map(|a| s.mem.get(&a).copied().unwrap_or(0))
            .collect()
    }

    pub fn poke_u32(&self, addr: u32, value: u32) {
        self.load(addr, &value.to_le_bytes());
    }

    pub fn peek_u32(&self, addr: u32) -> u32 {
        let b = self.dump(addr, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Register accesses, in order.
    pub fn log(&self) -> Vec<Access> {
        self.state.borrow().log.clone()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Access::Write(x, v) if x == addr => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Number of byte writes performed through the bus.
    pub fn byte_writes(&self) -> usize {
        self.state.borrow().byte_writes
    }

    /// Number of word writes to plain memory, i.e. anywhere but a modeled
    /// register.
    pub fn word_writes(&self) -> usize {
        self.state.borrow().word_writes
    }

    fn is_wdog_config(addr: u32) -> bool {
        addr == Wdog::<'static, FakeBus>::CS || addr == Wdog::<'static, FakeBus>::TOVAL
    }
}

impl Bus for FakeBus {
    unsafe fn read_u8(&self, addr: u32) -> u8 {
        self.state.borrow().mem.get(&addr).copied().unwrap_or(0)
    }

    unsafe fn write_u8(&self, addr: u32, value: u8) {
        let mut s = self.state.borrow_mut();
        s.byte_writes += 1;
        s.mem.insert(addr, value);
    }

    unsafe fn read_u32(&self, addr: u32) -> u32 {
        assert_eq!(addr & 3, 0, "unaligned word read at {addr:#x}");
        if LOGGED.contains(&addr) {
            let mut s = self.state.borrow_mut();
            s.log.push(Access::Read(addr));
            if addr == Wdog::<'static, FakeBus>::CNT && s.wdog == WdogLock::KeyWritten {
                s.wdog = WdogLock::Unlocked;
            }
        }
        self.peek_u32(addr)
    }

    unsafe fn write_u32(&self, addr: u32, value: u32) {
        assert_eq!(addr & 3, 0, "unaligned word write at {addr:#x}");
        if LOGGED.contains(&addr) {
            let mut s = self.state.borrow_mut();
            if Self::is_wdog_config(addr) && s.wdog != WdogLock::Unlocked {
                s.log.push(Access::LockedWrite(addr, value));
                return;
            }
            s.log.push(Access::Write(addr, value));
            if addr == Wdog::<'static, FakeBus>::CNT {
                s.wdog = if value == Wdog::<'static, FakeBus>::UNLOCK_KEY {
                    WdogLock::KeyWritten
                } else {
                    WdogLock::Locked
                };
            }
        } else {
            self.state.borrow_mut().word_writes += 1;
        }
        self.poke_u32(addr, value);
    }

    fn sync(&self) {
        self.state.borrow_mut().log.push(Access::Sync);
    }
}
