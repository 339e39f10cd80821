//! `cabin remove` command

use anyhow::Result;

use cabin::core::manifest::find_manifest;
use cabin::ops::edit_manifest::remove_dependencies;
use cabin::Shell;

use crate::cli::RemoveArgs;

pub fn execute(args: RemoveArgs, shell: &Shell) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let manifest_path = find_manifest(cwd)?;
    remove_dependencies(&manifest_path, &args.deps, shell)
}
