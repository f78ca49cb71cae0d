// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot trace.
//!
//! There's no console this early, so the reset sequence records what it did
//! in a ring buffer that a debugger can read out of RAM. Entries carry the
//! source line that produced them, a per-slot generation number, and a count
//! of how many times in a row the same event was recorded, so a loop that
//! emits one event many times costs one slot.
//!
//! The catch is that statics aren't valid until memory initialization has
//! run. The reset sequence therefore keeps its ring buffer on the stack and
//! copies it into `BOOT_RINGBUF` (see `arch`) once RAM is usable.
//!
//! ```ignore
//! let mut log = Ringbuf::new(Trace::None);
//! trace!(&mut log, Trace::Reset);
//! ```

use crate::meminit::VectorBase;

/// Number of entries in the boot ring buffer.
pub const BOOT_TRACE_ENTRIES: usize = 32;

/// Things the reset sequence records.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    None,
    Reset,
    FpuEnabled { lazy_stacking: bool },
    WatchdogDisabled,
    WatchdogEnabled { timeout: u16 },
    PowerModesAllowed(u8),
    CoreConfigured,
    VectorTable(VectorBase),
    DataCopied { bytes: u32 },
    CodeCopied { bytes: u32 },
    BssZeroed { bytes: u32 },
    MemoryInitialized,
    InterruptsUnmasked,
    ApplicationRunning,
    ApplicationReturned,
    Halted,
}

/// One slot in a [`Ringbuf`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of `N` entries of `T`.
#[derive(Copy, Clone, Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

/// The ring buffer used by the reset sequence.
pub type BootRingbuf = Ringbuf<Trace, BOOT_TRACE_ENTRIES>;

/// Records `payload` in a ring buffer, tagged with the current source line.
///
/// `trace!(buf, payload)` takes `buf` as `&mut Ringbuf<..>`.
#[macro_export]
macro_rules! trace {
    ($buf:expr, $payload:expr) => {{
        let (p, buf) = ($payload, &mut *$buf);
        $crate::trace::Ringbuf::entry(buf, line!() as u16, p);
    }};
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    /// Makes an empty ring buffer with every slot set to `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // Treat "never written" as an out-of-range index, so the first entry
        // lands in slot 0 and never coalesces.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // No modulus: usize::MAX + 1 wraps to 0, which is what we want.
        let ndx = {
            let next = last.wrapping_add(1);
            if next >= self.buffer.len() {
                0
            } else {
                next
            }
        };

        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Only reachable with N == 0.
            return;
        };
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };
        self.last = Some(ndx);
    }

    /// Iterates over recorded entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = match self.last {
            Some(last) => last + 1,
            None => N,
        };
        let n = if self.last.is_some() { N } else { 0 };
        (0..n)
            .map(move |i| &self.buffer[(start + i) % N])
            .filter(|e| e.count != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_lands_in_slot_zero() {
        let mut rb: Ringbuf<u8, 4> = Ringbuf::new(0);
        rb.entry(10, 7);
        assert_eq!(rb.last, Some(0));
        assert_eq!(
            rb.buffer[0],
            RingbufEntry {
                line: 10,
                generation: 1,
                count: 1,
                payload: 7
            }
        );
    }

    #[test]
    fn repeats_coalesce() {
        let mut rb: Ringbuf<u8, 4> = Ringbuf::new(0);
        for _ in 0..5 {
            rb.entry(10, 7);
        }
        // Same payload from another line is a different event.
        rb.entry(11, 7);
        let e: Vec<_> = rb.entries().map(|e| (e.line, e.count)).collect();
        assert_eq!(e, vec![(10, 5), (11, 1)]);
    }

    #[test]
    fn wraps_and_bumps_generation() {
        let mut rb: Ringbuf<u8, 3> = Ringbuf::new(0);
        for i in 0..5 {
            rb.entry(1, i);
        }
        let payloads: Vec<u8> = rb.entries().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![2, 3, 4]);
        assert_eq!(rb.buffer[0].generation, 2);
        assert_eq!(rb.buffer[2].generation, 1);
    }

    #[test]
    fn empty_has_no_entries() {
        let rb: BootRingbuf = Ringbuf::new(Trace::None);
        assert_eq!(rb.entries().count(), 0);
    }

    #[test]
    fn macro_records_line() {
        let mut rb: BootRingbuf = Ringbuf::new(Trace::None);
        let log = &mut rb;
        trace!(log, Trace::Reset);
        let here = line!() - 1;
        let e = rb.entries().next().copied();
        assert_eq!(e.map(|e| (e.line as u32, e.payload)), Some((here, Trace::Reset)));
    }
}
