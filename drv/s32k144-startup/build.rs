// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;

/// S32K144 interrupt map (reference manual, "S32K144 interrupt vector
/// assignments"). Numbers missing from this list are reserved by the vendor
/// and get a zero slot in the vector table.
const IRQS: &[(u16, &str)] = &[
    (0, "DMA0"),
    (1, "DMA1"),
    (2, "DMA2"),
    (3, "DMA3"),
    (4, "DMA4"),
    (5, "DMA5"),
    (6, "DMA6"),
    (7, "DMA7"),
    (8, "DMA8"),
    (9, "DMA9"),
    (10, "DMA10"),
    (11, "DMA11"),
    (12, "DMA12"),
    (13, "DMA13"),
    (14, "DMA14"),
    (15, "DMA15"),
    (16, "DMA_Error"),
    (17, "MCM"),
    (18, "FTFC"),
    (19, "Read_Collision"),
    (20, "LVD_LVW"),
    (21, "FTFC_Fault"),
    (22, "WDOG_EWM"),
    (23, "RCM"),
    (24, "LPI2C0_Master"),
    (25, "LPI2C0_Slave"),
    (26, "LPSPI0"),
    (27, "LPSPI1"),
    (28, "LPSPI2"),
    (31, "LPUART0_RxTx"),
    (33, "LPUART1_RxTx"),
    (35, "LPUART2_RxTx"),
    (39, "ADC0"),
    (40, "ADC1"),
    (41, "CMP0"),
    (44, "ERM_single_fault"),
    (45, "ERM_double_fault"),
    (46, "RTC"),
    (47, "RTC_Seconds"),
    (48, "LPIT0_Ch0"),
    (49, "LPIT0_Ch1"),
    (50, "LPIT0_Ch2"),
    (51, "LPIT0_Ch3"),
    (52, "PDB0"),
    (57, "SCG"),
    (58, "LPTMR0"),
    (59, "PORTA"),
    (60, "PORTB"),
    (61, "PORTC"),
    (62, "PORTD"),
    (63, "PORTE"),
    (64, "SWI"),
    (68, "PDB1"),
    (69, "FLEXIO"),
    (78, "CAN0_ORed"),
    (79, "CAN0_Error"),
    (80, "CAN0_Wake_Up"),
    (81, "CAN0_ORed_0_15_MB"),
    (82, "CAN0_ORed_16_31_MB"),
    (85, "CAN1_ORed"),
    (86, "CAN1_Error"),
    (88, "CAN1_ORed_0_15_MB"),
    (92, "CAN2_ORed"),
    (93, "CAN2_Error"),
    (95, "CAN2_ORed_0_15_MB"),
    (99, "FTM0_Ch0_Ch1"),
    (100, "FTM0_Ch2_Ch3"),
    (101, "FTM0_Ch4_Ch5"),
    (102, "FTM0_Ch6_Ch7"),
    (103, "FTM0_Fault"),
    (104, "FTM0_Ovf_Reload"),
    (105, "FTM1_Ch0_Ch1"),
    (106, "FTM1_Ch2_Ch3"),
    (107, "FTM1_Ch4_Ch5"),
    (108, "FTM1_Ch6_Ch7"),
    (109, "FTM1_Fault"),
    (110, "FTM1_Ovf_Reload"),
    (111, "FTM2_Ch0_Ch1"),
    (112, "FTM2_Ch2_Ch3"),
    (113, "FTM2_Ch4_Ch5"),
    (114, "FTM2_Ch6_Ch7"),
    (115, "FTM2_Fault"),
    (116, "FTM2_Ovf_Reload"),
    (117, "FTM3_Ch0_Ch1"),
    (118, "FTM3_Ch2_Ch3"),
    (119, "FTM3_Ch4_Ch5"),
    (120, "FTM3_Ch6_Ch7"),
    (121, "FTM3_Fault"),
    (122, "FTM3_Ovf_Reload"),
];

/// Device slots in the vector table. The boot ROM and our linker script
/// expect 255 words in total, 16 of which belong to the core. The generated
/// `interrupts.rs` carries this into the crate, where the total is checked.
const DEVICE_SLOTS: usize = 239;

/// Size in bytes of the vector table, used to reserve its RAM shadow.
const VECTOR_TABLE_BYTES: usize = (16 + DEVICE_SLOTS) * 4;

#[derive(Deserialize, Default, Debug)]
#[serde(default, deny_unknown_fields)]
struct StartupToml {
    core: CoreToml,
    flash: FlashToml,
}

#[derive(Deserialize, Debug)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct CoreToml {
    fpu: FpuMode,
    lazy_stacking: bool,
    watchdog: WatchdogMode,
    watchdog_timeout: u16,
    power_modes: Option<Vec<PowerMode>>,
    fault_policy: FaultPolicy,
    verify_layout: bool,
    unmask_interrupts: bool,
    relocate_vector_table: bool,
}

impl Default for CoreToml {
    fn default() -> Self {
        Self {
            fpu: FpuMode::Auto,
            lazy_stacking: true,
            watchdog: WatchdogMode::Disabled,
            watchdog_timeout: 0xffff,
            power_modes: None,
            fault_policy: FaultPolicy::Halt,
            verify_layout: true,
            unmask_interrupts: true,
            relocate_vector_table: false,
        }
    }
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum FpuMode {
    Auto,
    Enable,
    Disable,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum WatchdogMode {
    Disabled,
    Untouched,
    Enabled,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PowerMode {
    Hsrun,
    Vlp,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum FaultPolicy {
    Halt,
    Reset,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum SecurityMode {
    Unsecured,
    Secured,
}

#[derive(Deserialize, Debug)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FlashToml {
    security: SecurityMode,
    backdoor: bool,
    backdoor_key: Option<[u8; 8]>,
    mass_erase: bool,
    factory_access: bool,
    fopt: u8,
    program_protection: u32,
    eeprom_protection: u8,
    data_flash_protection: u8,
    allow_permanent_lock: bool,
}

impl Default for FlashToml {
    fn default() -> Self {
        Self {
            security: SecurityMode::Unsecured,
            backdoor: false,
            backdoor_key: None,
            mass_erase: true,
            factory_access: true,
            fopt: 0x7f,
            program_protection: 0xffff_ffff,
            eeprom_protection: 0xff,
            data_flash_protection: 0xff,
            allow_permanent_lock: false,
        }
    }
}

fn main() -> Result<()> {
    build_util::expose_m_profile();

    let config: StartupToml = build_util::config_or_default()?;
    check_flash(&config.flash)?;

    let out = build_util::out_dir();
    generate_config(&out, &config)?;
    generate_interrupts(&out)?;

    if build_util::target_is_arm() {
        generate_linker_fragments(&out, &config.core)?;
        std::fs::copy("link.x", out.join("link.x"))?;
        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rerun-if-changed=link.x");
    }
    println!("cargo:rerun-if-changed=build.rs");

    Ok(())
}

/// Refuses flash configurations that would take debug access away for good,
/// unless the application explicitly asked for that.
fn check_flash(flash: &FlashToml) -> Result<()> {
    if flash.backdoor_key.is_some() && !flash.backdoor {
        bail!("flash.backdoor-key is set but flash.backdoor is false");
    }
    if flash.backdoor && flash.backdoor_key.is_none() {
        bail!("flash.backdoor requires flash.backdoor-key");
    }
    if let Some(key) = flash.backdoor_key {
        // The FTFC refuses all-zero and all-one keys when comparing.
        if key == [0; 8] || key == [0xff; 8] {
            bail!("flash.backdoor-key must not be all zeros or all ones");
        }
    }
    let permanent = flash.security == SecurityMode::Secured
        && !flash.mass_erase
        && !flash.backdoor;
    if permanent && !flash.allow_permanent_lock {
        bail!(
            "flash configuration is secured with mass erase and backdoor \
             access both disabled, which locks the device permanently; set \
             flash.allow-permanent-lock = true if this is really intended"
        );
    }
    if flash.security == SecurityMode::Secured {
        println!(
            "cargo:warning=building a SECURED image: debug access will be \
             locked after the next reset"
        );
    }
    Ok(())
}

fn generate_config(out: &Path, config: &StartupToml) -> Result<()> {
    let core = &config.core;
    let flash = &config.flash;
    let mut file = File::create(out.join("startup_config.rs"))?;

    let fpu_enabled = match core.fpu {
        FpuMode::Auto => build_util::target_is_hard_float(),
        FpuMode::Enable => true,
        FpuMode::Disable => false,
    };
    if !fpu_enabled && build_util::target_is_hard_float() {
        bail!("core.fpu = \"disable\" on a hard-float target would fault");
    }
    println!("cargo:rustc-check-cfg=cfg(s32k_fpu_at_reset)");
    if fpu_enabled {
        // The reset trampoline grants FPU access before any Rust runs.
        println!("cargo:rustc-cfg=s32k_fpu_at_reset");
    }
    let fpu = if fpu_enabled {
        format!("FpuConfig::Enable {{ lazy_stacking: {} }}", core.lazy_stacking)
    } else {
        "FpuConfig::Untouched".to_string()
    };

    let watchdog = match core.watchdog {
        WatchdogMode::Disabled => "WatchdogConfig::Disabled".to_string(),
        WatchdogMode::Untouched => "WatchdogConfig::Untouched".to_string(),
        WatchdogMode::Enabled => {
            if core.watchdog_timeout == 0 {
                bail!("core.watchdog-timeout must be nonzero");
            }
            format!(
                "WatchdogConfig::Enabled {{ timeout: {:#x} }}",
                core.watchdog_timeout
            )
        }
    };

    let power_modes = match &core.power_modes {
        None => "None".to_string(),
        Some(modes) => {
            let names: Vec<&str> = modes
                .iter()
                .map(|m| match m {
                    PowerMode::Hsrun => "PowerModes::ALLOW_HSRUN",
                    PowerMode::Vlp => "PowerModes::ALLOW_VLP",
                })
                .collect();
            if names.is_empty() {
                "Some(PowerModes::empty())".to_string()
            } else {
                format!(
                    "Some(PowerModes::from_bits_retain({}))",
                    names
                        .iter()
                        .map(|n| format!("{n}.bits()"))
                        .collect::<Vec<_>>()
                        .join(" | ")
                )
            }
        }
    };

    let fault_policy = match core.fault_policy {
        FaultPolicy::Halt => "FaultPolicy::Halt",
        FaultPolicy::Reset => "FaultPolicy::Reset",
    };

    let security = match flash.security {
        SecurityMode::Unsecured => "Security::Unsecured".to_string(),
        SecurityMode::Secured => format!(
            "Security::Secured {{ backdoor: {}, mass_erase: {}, \
             factory_access: {} }}",
            flash.backdoor, flash.mass_erase, flash.factory_access
        ),
    };
    let key = flash.backdoor_key.unwrap_or([0xff; 8]);

    writeln!(file, "// See build.rs for details")?;
    writeln!(file, "pub const CONFIG: StartupConfig = StartupConfig {{")?;
    writeln!(file, "    core: BringUpConfig {{")?;
    writeln!(file, "        fpu: {fpu},")?;
    writeln!(file, "        watchdog: {watchdog},")?;
    writeln!(file, "        power_modes: {power_modes},")?;
    writeln!(file, "    }},")?;
    writeln!(file, "    fault_policy: {fault_policy},")?;
    writeln!(file, "    verify_layout: {},", core.verify_layout)?;
    writeln!(file, "    unmask_interrupts: {},", core.unmask_interrupts)?;
    writeln!(file, "}};")?;
    writeln!(file)?;
    writeln!(file, "pub const FLASH_CONFIG: FlashConfig = FlashConfig::new(")?;
    writeln!(file, "    {security},")?;
    writeln!(file, "    {key:#04x?},")?;
    writeln!(file, "    {:#010x},", flash.program_protection)?;
    writeln!(file, "    {:#04x},", flash.fopt)?;
    writeln!(file, "    {:#04x},", flash.eeprom_protection)?;
    writeln!(file, "    {:#04x},", flash.data_flash_protection)?;
    writeln!(file, ");")?;
    writeln!(file)?;
    writeln!(
        file,
        "pub const ALLOW_PERMANENT_LOCK: bool = {};",
        flash.allow_permanent_lock
    )?;

    Ok(())
}

/// Generates the `Interrupt` enum, the extern declarations for each named
/// interrupt, and the device half of the vector table.
fn generate_interrupts(out: &Path) -> Result<()> {
    let mut file = File::create(out.join("interrupts.rs"))?;

    writeln!(file, "// See build.rs for details")?;
    writeln!(file, "/// Device interrupt sources, numbered as the NVIC sees them.")?;
    writeln!(file, "#[derive(Copy, Clone, Debug, PartialEq, Eq)]")?;
    writeln!(file, "#[allow(non_camel_case_types)]")?;
    writeln!(file, "#[repr(u16)]")?;
    writeln!(file, "pub enum Interrupt {{")?;
    for (num, name) in IRQS {
        writeln!(file, "    {name} = {num},")?;
    }
    writeln!(file, "}}")?;
    writeln!(file)?;

    writeln!(file, "impl Interrupt {{")?;
    writeln!(file, "    /// Every named interrupt, in vector table order.")?;
    writeln!(
        file,
        "    pub const ALL: [Interrupt; {}] = [",
        IRQS.len()
    )?;
    for (_, name) in IRQS {
        writeln!(file, "        Interrupt::{name},")?;
    }
    writeln!(file, "    ];")?;
    writeln!(file)?;
    writeln!(file, "    pub const fn name(self) -> &'static str {{")?;
    writeln!(file, "        match self {{")?;
    for (_, name) in IRQS {
        writeln!(file, "            Interrupt::{name} => \"{name}\",")?;
    }
    writeln!(file, "        }}")?;
    writeln!(file, "    }}")?;
    writeln!(file, "}}")?;
    writeln!(file)?;

    writeln!(file, "#[cfg(target_arch = \"arm\")]")?;
    writeln!(file, "extern \"C\" {{")?;
    for (_, name) in IRQS {
        writeln!(file, "    fn {name}();")?;
    }
    writeln!(file, "}}")?;
    writeln!(file)?;

    writeln!(
        file,
        "/// Slots belonging to the device's interrupt controller."
    )?;
    writeln!(file, "pub const DEVICE_SLOTS: usize = {DEVICE_SLOTS};")?;
    writeln!(file)?;

    writeln!(file, "#[cfg(target_arch = \"arm\")]")?;
    writeln!(
        file,
        "pub(crate) const DEVICE_VECTORS: [Vector; DEVICE_SLOTS] = ["
    )?;
    let mut named = IRQS.iter().peekable();
    for slot in 0..DEVICE_SLOTS {
        match named.peek() {
            Some((num, name)) if *num as usize == slot => {
                writeln!(file, "    Vector::handler({name}),")?;
                named.next();
            }
            _ => writeln!(file, "    Vector::RESERVED, // {slot}")?,
        }
    }
    writeln!(file, "];")?;

    Ok(())
}

fn generate_linker_fragments(out: &Path, core: &CoreToml) -> Result<()> {
    let mut device = File::create(out.join("device.x"))?;
    for (_, name) in IRQS {
        writeln!(device, "PROVIDE({name} = DefaultHandler);")?;
    }

    let mut startup = File::create(out.join("startup.x"))?;
    let shadow = if core.relocate_vector_table {
        VECTOR_TABLE_BYTES
    } else {
        0
    };
    writeln!(startup, "__RAM_VECTOR_TABLE_SIZE = {shadow:#x};")?;

    Ok(())
}
