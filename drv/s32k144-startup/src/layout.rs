// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Section descriptors, as produced by the linker.
//!
//! The linker script (`link.x`) exports a start and end symbol for every
//! region startup has to prepare. On the device those get collected into a
//! [`SectionMap`] by `arch::section_map`; tests build one by hand.

use core::fmt;

/// A half-open address range `[start, end)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Length in bytes, or zero if the span is inverted. Callers that care
    /// about inversion should `validate` first.
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end
            && other.start < self.end
    }
}

/// A section that's stored in one place and used in another: the load span
/// is in flash, the run span in RAM.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub load: Span,
    pub run: Span,
}

/// Which section a descriptor describes, for error reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Section {
    VectorTable,
    Data,
    CodeRam,
    Bss,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::VectorTable => "vector table",
            Section::Data => ".data",
            Section::CodeRam => ".code_ram",
            Section::Bss => ".bss",
        })
    }
}

/// Every way a section map can be wrong. All of these are build problems;
/// none can be recovered from at runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// A span ends before it starts.
    Inverted(Section),
    /// The flash and RAM copies of a section differ in length.
    LengthMismatch(Section),
    /// A section isn't aligned the way it's accessed: by word, or for the
    /// vector table, the way VTOR requires.
    Misaligned(Section),
    /// Two RAM destinations overlap, so initializing one would clobber the
    /// other.
    Overlap(Section, Section),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Inverted(s) => write!(f, "{s} ends before it starts"),
            LayoutError::LengthMismatch(s) => {
                write!(f, "{s} load and run lengths differ")
            }
            LayoutError::Misaligned(s) => write!(f, "{s} is misaligned"),
            LayoutError::Overlap(a, b) => write!(f, "{a} overlaps {b} in RAM"),
        }
    }
}

/// Alignment VTOR requires of the table it points at. TBLOFF starts at bit 7,
/// and a table of 255 entries rounds up to 256 words.
pub const VECTOR_TABLE_ALIGN: u32 = 0x400;

/// Everything the memory initializer needs to know about the image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SectionMap {
    /// The vector table in flash; `run` is its RAM shadow. If the two start
    /// at the same address, no shadow is in use.
    pub vectors: Relocation,
    /// Initialized data.
    pub data: Relocation,
    /// Code that executes from RAM.
    pub code: Relocation,
    /// Zero-initialized data.
    pub bss: Span,
}

impl SectionMap {
    /// Returns `true` if the vector table is copied to RAM at startup.
    pub fn relocates_vectors(&self) -> bool {
        self.vectors.run.start != self.vectors.load.start
    }

    /// Checks the invariants the memory initializer relies on.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let relocations = [
            (Section::VectorTable, &self.vectors),
            (Section::Data, &self.data),
            (Section::CodeRam, &self.code),
        ];
        for (section, r) in relocations {
            for span in [r.load, r.run] {
                if span.end < span.start {
                    return Err(LayoutError::Inverted(section));
                }
            }
        }
        if self.bss.end < self.bss.start {
            return Err(LayoutError::Inverted(Section::Bss));
        }

        for (section, r) in relocations {
            if r.load.len() != r.run.len() {
                return Err(LayoutError::LengthMismatch(section));
            }
        }

        // The vector table is copied a word at a time, so both copies must be
        // word aligned and a whole number of words long. Whichever copy VTOR
        // ends up pointing at must also satisfy VTOR's alignment.
        let v = &self.vectors;
        if (v.load.start | v.run.start | v.load.len()) & 0b11 != 0 {
            return Err(LayoutError::Misaligned(Section::VectorTable));
        }
        if v.run.start & (VECTOR_TABLE_ALIGN - 1) != 0 {
            return Err(LayoutError::Misaligned(Section::VectorTable));
        }

        if self.relocates_vectors() {
            for (section, other) in [
                (Section::Data, &self.data.run),
                (Section::CodeRam, &self.code.run),
                (Section::Bss, &self.bss),
            ] {
                if v.run.overlaps(other) {
                    return Err(LayoutError::Overlap(
                        Section::VectorTable,
                        section,
                    ));
                }
            }
        }
        let ram = [
            (Section::Data, &self.data.run),
            (Section::CodeRam, &self.code.run),
            (Section::Bss, &self.bss),
        ];
        for (i, (a, sa)) in ram.iter().enumerate() {
            for (b, sb) in &ram[i + 1..] {
                if sa.overlaps(sb) {
                    return Err(LayoutError::Overlap(*a, *b));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A plausible layout with nothing overlapping and no vector shadow.
    pub(crate) fn sample() -> SectionMap {
        SectionMap {
            vectors: Relocation {
                load: Span::new(0x0, 0x3fc),
                run: Span::new(0x0, 0x3fc),
            },
            data: Relocation {
                load: Span::new(0x1000, 0x1010),
                run: Span::new(0x2000, 0x2010),
            },
            code: Relocation {
                load: Span::new(0x1010, 0x1018),
                run: Span::new(0x2010, 0x2018),
            },
            bss: Span::new(0x3000, 0x3100),
        }
    }

    #[test]
    fn sample_is_valid() {
        assert_eq!(sample().validate(), Ok(()));
        assert!(!sample().relocates_vectors());
    }

    #[test]
    fn empty_sections_are_valid() {
        let mut map = sample();
        map.data.load = Span::new(0x1000, 0x1000);
        map.data.run = Span::new(0x2000, 0x2000);
        map.bss = Span::new(0x3000, 0x3000);
        assert_eq!(map.validate(), Ok(()));
    }

    #[test]
    fn inverted_span() {
        let mut map = sample();
        map.bss = Span::new(0x3100, 0x3000);
        assert_eq!(map.validate(), Err(LayoutError::Inverted(Section::Bss)));

        let mut map = sample();
        map.code.load = Span::new(0x1018, 0x1010);
        assert_eq!(
            map.validate(),
            Err(LayoutError::Inverted(Section::CodeRam))
        );
    }

    #[test]
    fn length_mismatch() {
        let mut map = sample();
        map.data.run = Span::new(0x2000, 0x2008);
        assert_eq!(
            map.validate(),
            Err(LayoutError::LengthMismatch(Section::Data))
        );
    }

    #[test]
    fn misaligned_vectors() {
        let mut map = sample();
        map.vectors.run = Span::new(0x2_0002, 0x2_03fe);
        assert_eq!(
            map.validate(),
            Err(LayoutError::Misaligned(Section::VectorTable))
        );
    }

    #[test]
    fn vector_shadow_needs_vtor_alignment() {
        // Word aligned, but VTOR can't point here.
        let mut map = sample();
        map.vectors.run = Span::new(0x1fff_8004, 0x1fff_8400);
        assert_eq!(
            map.validate(),
            Err(LayoutError::Misaligned(Section::VectorTable))
        );

        map.vectors.run = Span::new(0x1fff_8000, 0x1fff_83fc);
        assert_eq!(map.validate(), Ok(()));
    }

    #[test]
    fn overlapping_ram() {
        let mut map = sample();
        map.bss = Span::new(0x2008, 0x2100);
        assert_eq!(
            map.validate(),
            Err(LayoutError::Overlap(Section::Data, Section::Bss))
        );

        let mut map = sample();
        map.vectors.run = Span::new(0x3000, 0x33fc);
        assert_eq!(
            map.validate(),
            Err(LayoutError::Overlap(Section::VectorTable, Section::Bss))
        );
    }

    #[test]
    fn empty_spans_never_overlap() {
        let a = Span::new(0x100, 0x100);
        let b = Span::new(0x0, 0x200);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }
}
