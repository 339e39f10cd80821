//! `cabin clean` command

use anyhow::{bail, Result};

use cabin::core::manifest::find_manifest;
use cabin::Shell;

use crate::cli::CleanArgs;

pub fn execute(args: CleanArgs, shell: &Shell) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest_path = find_manifest(cwd)?;
    let mut out_dir = manifest_path
        .parent()
        .unwrap_or(std::path::Path::new("."))
        .join("cabin-out");

    if let Some(ref profile) = args.profile {
        // The dev profile's artifacts live under `debug`, as in Cargo.
        let dir = match profile.as_str() {
            "dev" | "debug" => "debug",
            "release" => "release",
            _ => bail!("invalid argument for --profile: {profile}"),
        };
        out_dir.push(dir);
    }

    if out_dir.exists() {
        shell.status("Removing", std::fs::canonicalize(&out_dir)?.display().to_string());
        std::fs::remove_dir_all(&out_dir)?;
    }
    Ok(())
}
