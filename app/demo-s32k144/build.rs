// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use anyhow::Result;

fn main() -> Result<()> {
    // link.x (from drv-s32k144-startup) INCLUDEs memory.x; put ours where
    // the linker will look.
    let dir = PathBuf::from(build_util::env_var("CARGO_MANIFEST_DIR")?);
    let out = build_util::out_dir();
    std::fs::copy(dir.join("memory.x"), out.join("memory.x"))?;
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
