// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::path::PathBuf;

/// Environment variable naming the TOML file that configures startup.
pub const STARTUP_CONFIG_VAR: &str = "S32K_STARTUP_CONFIG";

/// M-profile architecture version of the current target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MProfile {
    V6,
    V7,
    V8,
}

/// Exposes the CPU's M-profile architecture version. This isn't available in
/// rustc's standard environment.
///
/// This will set one of `cfg(armv6m`), `cfg(armv7m)`, or `cfg(armv8m)`
/// depending on the value of the `TARGET` environment variable. Host targets
/// (used for unit tests) set nothing and return `None`.
pub fn expose_m_profile() -> Option<MProfile> {
    println!("cargo:rustc-check-cfg=cfg(armv6m)");
    println!("cargo:rustc-check-cfg=cfg(armv7m)");
    println!("cargo:rustc-check-cfg=cfg(armv8m)");

    let profile = m_profile(&target());
    match profile {
        Some(MProfile::V6) => println!("cargo:rustc-cfg=armv6m"),
        Some(MProfile::V7) => println!("cargo:rustc-cfg=armv7m"),
        Some(MProfile::V8) => println!("cargo:rustc-cfg=armv8m"),
        None => (),
    }
    profile
}

fn m_profile(target: &str) -> Option<MProfile> {
    if target.starts_with("thumbv6m") {
        Some(MProfile::V6)
    } else if target.starts_with("thumbv7m") || target.starts_with("thumbv7em")
    {
        Some(MProfile::V7)
    } else if target.starts_with("thumbv8m") {
        Some(MProfile::V8)
    } else {
        None
    }
}

/// Returns `true` if the target passes floating point values in FPU
/// registers, which means the compiler is free to emit FPU instructions
/// anywhere in the image.
pub fn target_is_hard_float() -> bool {
    let target = target();
    target.starts_with("thumb") && target.ends_with("eabihf")
}

/// Returns `true` when building for a bare-metal ARM target rather than the
/// host.
pub fn target_is_arm() -> bool {
    m_profile(&target()).is_some()
}

fn target() -> String {
    env::var("TARGET").unwrap_or_default()
}

/// Returns the build script's `OUT_DIR`.
pub fn out_dir() -> PathBuf {
    PathBuf::from(env::var_os("OUT_DIR").unwrap_or_default())
}

/// Reads an environment variable, naming it in the error if it's missing,
/// and asks cargo to rerun us when it changes.
pub fn env_var(var: &str) -> Result<String> {
    println!("cargo:rerun-if-env-changed={var}");
    env::var(var).with_context(|| format!("reading ${var}"))
}

/// Pulls the startup configuration for purposes of a build task. The
/// variable named by [`STARTUP_CONFIG_VAR`] holds the path to a TOML file;
/// when the variable is missing, `T::default()` is used. If the file exists
/// but fails to parse, this still fails with `Err`.
///
/// Note that -- thanks to the magic of Serde -- `T` need not contain the
/// entire file, only those parts that a particular build task cares about.
pub fn config_or_default<T: DeserializeOwned + Default>() -> Result<T> {
    toml_from_path_env_def(STARTUP_CONFIG_VAR)
}

fn toml_from_path_env_def<T: DeserializeOwned + Default>(
    var: &str,
) -> Result<T> {
    // We want to emit this whether or not the env var is present, so that we'll
    // be re-run if it becomes present.
    println!("cargo:rerun-if-env-changed={var}");

    let path = match env::var(var) {
        Ok(path) => PathBuf::from(path),
        Err(_) => {
            println!("--- var ${var} not present, using default ---");
            return Ok(T::default());
        }
    };
    println!("cargo:rerun-if-changed={}", path.display());

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    println!("--- toml from {} ---", path.display());
    println!("{text}");

    let rval = toml::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(rval)
}
