// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The flash configuration field.
//!
//! Sixteen bytes at flash offset 0x400 that the boot ROM loads into the FTFC
//! before the core leaves reset (S32K1xx RM 36.4.3). There's no code here
//! that runs; getting these bytes wrong is nonetheless the easiest way to
//! brick a part, since a secured image with mass erase and backdoor access
//! both turned off can never be debugged or reflashed again.

use static_assertions::const_assert_eq;
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Offset of the record from the start of flash.
pub const FLASH_CONFIG_OFFSET: u32 = 0x400;

/// What the FSEC byte says about debug and flash access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Security {
    /// Debug access and flash commands unrestricted.
    Unsecured,
    /// MCU secured: the debugger can't reach memory.
    Secured {
        /// The backdoor key can unsecure the part.
        backdoor: bool,
        /// The debugger may still mass-erase (and thereby unsecure) the part.
        mass_erase: bool,
        /// NXP factory access is granted.
        factory_access: bool,
    },
}

mod fsec {
    pub const SEC_UNSECURED: u8 = 0b10;
    pub const SEC_SECURED: u8 = 0b11;
    pub const SEC_MASK: u8 = 0b11;

    pub const FSLACC_SHIFT: u8 = 2;
    pub const FSLACC_GRANTED: u8 = 0b11;
    pub const FSLACC_DENIED: u8 = 0b10;

    pub const MEEN_SHIFT: u8 = 4;
    pub const MEEN_DISABLED: u8 = 0b10;
    pub const MEEN_ENABLED: u8 = 0b11;

    pub const KEYEN_SHIFT: u8 = 6;
    pub const KEYEN_ENABLED: u8 = 0b10;
    pub const KEYEN_DISABLED: u8 = 0b11;
}

impl Security {
    /// Encodes this as an FSEC byte.
    ///
    /// Unsecured encodes as 0xFE, which is also what an erased part reads as
    /// once SEC is cleared to `10`.
    pub const fn fsec(self) -> u8 {
        match self {
            Security::Unsecured => {
                fsec::SEC_UNSECURED
                    | fsec::FSLACC_GRANTED << fsec::FSLACC_SHIFT
                    | fsec::MEEN_ENABLED << fsec::MEEN_SHIFT
                    | fsec::KEYEN_DISABLED << fsec::KEYEN_SHIFT
            }
            Security::Secured {
                backdoor,
                mass_erase,
                factory_access,
            } => {
                let fslacc = if factory_access {
                    fsec::FSLACC_GRANTED
                } else {
                    fsec::FSLACC_DENIED
                };
                let meen = if mass_erase {
                    fsec::MEEN_ENABLED
                } else {
                    fsec::MEEN_DISABLED
                };
                let keyen = if backdoor {
                    fsec::KEYEN_ENABLED
                } else {
                    fsec::KEYEN_DISABLED
                };
                fsec::SEC_SECURED
                    | fslacc << fsec::FSLACC_SHIFT
                    | meen << fsec::MEEN_SHIFT
                    | keyen << fsec::KEYEN_SHIFT
            }
        }
    }

    /// Decodes an FSEC byte the way the FTFC does. Only `10` in SEC means
    /// unsecured; every other encoding of each field falls on the side the
    /// reference manual gives it.
    pub const fn from_fsec(byte: u8) -> Self {
        if byte & fsec::SEC_MASK == fsec::SEC_UNSECURED {
            return Security::Unsecured;
        }
        let fslacc = (byte >> fsec::FSLACC_SHIFT) & 0b11;
        let meen = (byte >> fsec::MEEN_SHIFT) & 0b11;
        let keyen = (byte >> fsec::KEYEN_SHIFT) & 0b11;
        Security::Secured {
            backdoor: keyen == fsec::KEYEN_ENABLED,
            mass_erase: meen != fsec::MEEN_DISABLED,
            factory_access: fslacc == 0b00 || fslacc == 0b11,
        }
    }

    /// Returns `true` if nothing, short of NXP, can ever unsecure a part
    /// programmed with this.
    pub const fn is_permanent_lock(self) -> bool {
        matches!(
            self,
            Security::Secured {
                backdoor: false,
                mass_erase: false,
                ..
            }
        )
    }
}

/// The flash configuration field, in flash order.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct FlashConfig {
    /// Compared against the key written through the FTFC to unsecure.
    pub backdoor_key: [u8; 8],
    /// P-flash protection, FPROT3 first. A set bit leaves its region
    /// writable.
    pub fprot: [u8; 4],
    pub fsec: u8,
    /// Boot options; 0x7F selects the reset defaults.
    pub fopt: u8,
    /// EEPROM protection.
    pub feprot: u8,
    /// D-flash protection.
    pub fdprot: u8,
}

const_assert_eq!(core::mem::size_of::<FlashConfig>(), 16);
const_assert_eq!(core::mem::align_of::<FlashConfig>(), 1);

impl FlashConfig {
    pub const fn new(
        security: Security,
        backdoor_key: [u8; 8],
        program_protection: u32,
        fopt: u8,
        eeprom_protection: u8,
        data_flash_protection: u8,
    ) -> Self {
        Self {
            backdoor_key,
            fprot: program_protection.to_le_bytes(),
            fsec: security.fsec(),
            fopt,
            feprot: eeprom_protection,
            fdprot: data_flash_protection,
        }
    }

    pub const fn security(&self) -> Security {
        Security::from_fsec(self.fsec)
    }
}

impl Default for FlashConfig {
    /// Unsecured, unprotected, default boot options.
    fn default() -> Self {
        Self::new(Security::Unsecured, [0xff; 8], 0xffff_ffff, 0x7f, 0xff, 0xff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::{FromBytes, IntoBytes};

    #[test]
    fn default_image_bytes() {
        let expected = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // backdoor key
            0xff, 0xff, 0xff, 0xff, // FPROT
            0xfe, 0x7f, 0xff, 0xff, // FSEC FOPT FEPROT FDPROT
        ];
        assert_eq!(FlashConfig::default().as_bytes(), &expected);
    }

    #[test]
    fn unsecured_is_0xfe() {
        assert_eq!(Security::Unsecured.fsec(), 0xfe);
        assert!(!Security::Unsecured.is_permanent_lock());
    }

    #[test]
    fn secured_encodings() {
        // Secured, but everything that could get us back in is allowed.
        let s = Security::Secured {
            backdoor: true,
            mass_erase: true,
            factory_access: true,
        };
        assert_eq!(s.fsec(), 0b10_11_11_11);

        let lock = Security::Secured {
            backdoor: false,
            mass_erase: false,
            factory_access: false,
        };
        assert_eq!(lock.fsec(), 0b11_10_10_11);
        assert!(lock.is_permanent_lock());
    }

    #[test]
    fn every_policy_survives_the_ftfc() {
        for bits in 0..8u8 {
            let s = Security::Secured {
                backdoor: bits & 1 != 0,
                mass_erase: bits & 2 != 0,
                factory_access: bits & 4 != 0,
            };
            assert_eq!(Security::from_fsec(s.fsec()), s);
        }
        assert_eq!(Security::from_fsec(0xfe), Security::Unsecured);
    }

    #[test]
    fn erased_flash_reads_secured() {
        // An erased record is 0xFF: SEC = 11 is secured, but with mass erase
        // still available, so not a lock.
        let s = Security::from_fsec(0xff);
        assert!(matches!(s, Security::Secured { mass_erase: true, .. }));
        assert!(!s.is_permanent_lock());
    }

    #[test]
    fn protection_bytes_in_flash_order() {
        let c = FlashConfig::new(
            Security::Unsecured,
            [1, 2, 3, 4, 5, 6, 7, 8],
            0x0302_01ff,
            0x7d,
            0xf0,
            0x0f,
        );
        assert_eq!(
            c.as_bytes(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 0xff, 1, 2, 3, 0xfe, 0x7d, 0xf0, 0x0f]
        );
        let back = FlashConfig::read_from_bytes(c.as_bytes());
        assert_eq!(back.ok(), Some(c));
        assert_eq!(c.security(), Security::Unsecured);
    }
}
